//! Error taxonomy shared by the store, the forwarder and the channel client.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`RelayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A configuration value was rejected on write.
    InvalidConfig,
    /// A backend could not load or save the configuration document.
    PersistenceFailure,
    /// A proxied request could not reach its upstream.
    UpstreamUnreachable,
    /// A message was sent without a live channel.
    NotConnected,
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the document failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored document is not a valid configuration.
    #[error("malformed document in {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Structural validation of a configuration failed.
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Loading or saving through the active backend failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),

    /// The forwarded request failed at the network level.
    #[error("upstream {target} unreachable: {source}")]
    UpstreamUnreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// The proxied path could not be turned into an upstream URL.
    #[error("cannot resolve upstream target: {0}")]
    InvalidTarget(#[from] url::ParseError),

    /// No channel connection has been established.
    #[error("channel is not connected")]
    NotConnected,
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            RelayError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            RelayError::UpstreamUnreachable { .. } | RelayError::InvalidTarget(_) => {
                ErrorKind::UpstreamUnreachable
            }
            RelayError::NotConnected => ErrorKind::NotConnected,
        }
    }
}

/// Result alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
