//! Session configuration, loadable from TOML.
//!
//! ```toml
//! reserved_tokens = ["arg0"]
//!
//! [reasoner]
//! host = "localhost"
//! port = 8088
//! timeout_ms = 1000
//! ontology = "kb/toys.owl"
//!
//! [document]
//! path = "kb/facts.redb"
//! collection = "facts"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbConfig {
    /// Tokens that may not appear in any statement.
    #[serde(default = "default_reserved_tokens")]
    pub reserved_tokens: Vec<String>,
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

/// Reasoner endpoint and connect behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reply read timeout; `0` waits forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Leave the reasoner's own request logging off.
    #[serde(default)]
    pub debugging: bool,
    /// Ontology loaded right after connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology: Option<PathBuf>,
}

/// Document store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// redb file; in-memory when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_reserved_tokens() -> Vec<String> {
    vec!["arg0".into()]
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    8088
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_collection() -> String {
    "facts".into()
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            reasoner: ReasonerConfig::default(),
            document: DocumentConfig::default(),
            reserved_tokens: default_reserved_tokens(),
        }
    }
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            debugging: false,
            ontology: None,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: None,
            collection: default_collection(),
        }
    }
}

impl ReasonerConfig {
    /// `host:port`, the key of the shared connection.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl KbConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
