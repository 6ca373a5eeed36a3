//! Error kinds surfaced by the update engine.
//!
//! Failures while loading settings or fetching the manifest abort a whole
//! cycle; failures while downloading or verifying a single package abort only
//! the remaining queue. The orchestrator decides which is which; this type only
//! classifies.

use std::path::PathBuf;

/// Error returned by transport, manifest, settings and orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Connection, DNS, TLS, timeout or other transport-level failure.
    #[error("network: {0}")]
    Network(String),

    /// Server answered with a non-2xx status.
    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u32 },

    /// Malformed manifest or settings document.
    #[error("parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem access failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloaded file does not hash to the manifest value.
    #[error("hash mismatch for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Cancellation token was raised while a transfer was running.
    #[error("download cancelled")]
    Cancelled,

    /// Another update cycle is already active in this process.
    #[error("an update cycle is already running")]
    AlreadyRunning,
}

impl UpdateError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdateError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, source: serde_json::Error) -> Self {
        UpdateError::Parse {
            what: what.into(),
            source,
        }
    }

    /// True for transport failures and non-success HTTP statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, UpdateError::Network(_) | UpdateError::Http { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, UpdateError::Parse { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self, UpdateError::Io { .. })
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, UpdateError::Integrity { .. })
    }
}

impl From<curl::Error> for UpdateError {
    fn from(e: curl::Error) -> Self {
        UpdateError::Network(e.to_string())
    }
}
