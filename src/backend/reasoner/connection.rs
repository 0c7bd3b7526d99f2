//! The shared reasoner connection.
//!
//! One [`ReasonerConnection`] exists per reasoner address and is shared by
//! every session talking to it (see [`ConnectionRegistry`](crate::registry::ConnectionRegistry)).
//! Requests are strictly request/response: the transport lock is held from
//! write until the reply line is read.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::context::ContextTracker;
use crate::error::ReasonerError;

use super::request::Request;
use super::transport::{LineTransport, TcpTransport};

/// Handle sessions hold to the process-wide connection.
pub type SharedConnection = Arc<ReasonerConnection>;

/// A single stateful line connection plus the abox currently selected on it.
pub struct ReasonerConnection {
    address: String,
    timeout: Option<Duration>,
    transport: Mutex<Option<Box<dyn LineTransport>>>,
    context: ContextTracker,
    writes: AtomicUsize,
    handshaken: AtomicBool,
}

impl ReasonerConnection {
    /// A connection to `address` that opens lazily on [`open`](Self::open).
    pub fn new(address: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            address: address.into(),
            timeout,
            transport: Mutex::new(None),
            context: ContextTracker::new(),
            writes: AtomicUsize::new(0),
            handshaken: AtomicBool::new(false),
        }
    }

    /// A connection over an already open transport.
    pub fn with_transport(address: impl Into<String>, transport: Box<dyn LineTransport>) -> Self {
        let conn = Self::new(address, None);
        *conn.transport.lock().expect("transport lock poisoned") = Some(transport);
        conn
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.transport
            .lock()
            .expect("transport lock poisoned")
            .is_some()
    }

    /// Open the TCP transport if not already open. Returns whether it was opened now.
    pub fn open(&self) -> Result<bool, ReasonerError> {
        let mut guard = self.transport.lock().expect("transport lock poisoned");
        if guard.is_some() {
            return Ok(false);
        }
        *guard = Some(Box::new(TcpTransport::connect(&self.address, self.timeout)?));
        self.context.clear();
        self.handshaken.store(false, Ordering::SeqCst);
        Ok(true)
    }

    /// True exactly once per opened transport: the caller that sees `true`
    /// sends the protocol handshake.
    pub fn claim_handshake(&self) -> bool {
        !self.handshaken.swap(true, Ordering::SeqCst)
    }

    /// Close the transport; later requests fail with `NotConnected`.
    pub fn close(&self) -> Result<(), ReasonerError> {
        let transport = self.transport.lock().expect("transport lock poisoned").take();
        self.context.clear();
        if let Some(mut transport) = transport {
            transport.close()?;
            tracing::info!(address = %self.address, "reasoner connection closed");
        }
        Ok(())
    }

    /// Tracker of the abox currently selected on this connection.
    pub fn context(&self) -> &ContextTracker {
        &self.context
    }

    /// Number of request lines written since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Write one request and read its reply line.
    pub fn request(&self, request: &Request<'_>) -> Result<String, ReasonerError> {
        let line = request.to_string();
        let mut guard = self.transport.lock().expect("transport lock poisoned");
        let transport = guard.as_mut().ok_or(ReasonerError::NotConnected)?;
        tracing::debug!(request = %line, scoped = request.is_scoped(), "reasoner request");
        transport.write_line(&line)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        let reply = transport.read_line()?;
        tracing::trace!(%reply, "reasoner reply");
        Ok(reply)
    }

    /// Write one request and discard its reply.
    pub fn send(&self, request: &Request<'_>) -> Result<(), ReasonerError> {
        self.request(request).map(|_| ())
    }
}

impl std::fmt::Debug for ReasonerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasonerConnection")
            .field("address", &self.address)
            .field("open", &self.is_open())
            .field("active", &self.context.active())
            .field("writes", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::reasoner::mock::MockTransport;

    #[test]
    fn unopened_connection_rejects_requests() {
        let conn = ReasonerConnection::new("localhost:1", None);
        assert!(!conn.is_open());
        assert!(matches!(
            conn.request(&Request::AllIndividuals),
            Err(ReasonerError::NotConnected)
        ));
    }

    #[test]
    fn counts_writes_and_closes() {
        let mock = MockTransport::new();
        let conn = ReasonerConnection::with_transport("mock", Box::new(mock));
        conn.send(&Request::FullReset).unwrap();
        conn.send(&Request::PrepareAbox).unwrap();
        assert_eq!(conn.write_count(), 2);

        assert!(conn.claim_handshake());
        assert!(!conn.claim_handshake());

        conn.context().set("A1");
        conn.close().unwrap();
        assert!(!conn.is_open());
        assert_eq!(conn.context().active(), None);
    }
}
