//! Process-wide registry of shared reasoner connections.
//!
//! Every session talking to the same reasoner address gets the same
//! [`SharedConnection`], and with it the same active-abox tracker. Sessions
//! never open a connection of their own.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;

use crate::backend::reasoner::connection::{ReasonerConnection, SharedConnection};

/// Address → connection map. One per process via [`global`](Self::global),
/// or injected explicitly.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, SharedConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ConnectionRegistry {
        static GLOBAL: OnceLock<ConnectionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ConnectionRegistry::new)
    }

    /// The connection for `address`, created (unopened) on first use.
    pub fn get_or_create(&self, address: &str, timeout: Option<Duration>) -> SharedConnection {
        self.connections
            .entry(address.to_string())
            .or_insert_with(|| {
                tracing::debug!(address, "registering reasoner connection");
                Arc::new(ReasonerConnection::new(address, timeout))
            })
            .clone()
    }

    /// Register an existing connection under its address, replacing any previous one.
    pub fn register(&self, connection: SharedConnection) -> SharedConnection {
        self.connections
            .insert(connection.address().to_string(), connection.clone());
        connection
    }

    pub fn get(&self, address: &str) -> Option<SharedConnection> {
        self.connections.get(address).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close and forget every connection.
    pub fn shutdown(&self) {
        let addresses: Vec<String> = self.connections.iter().map(|c| c.key().clone()).collect();
        for address in addresses {
            let Some((_, connection)) = self.connections.remove(&address) else {
                continue;
            };
            if let Err(e) = connection.close() {
                tracing::warn!(%address, error = %e, "failed to close reasoner connection");
            }
        }
    }
}
