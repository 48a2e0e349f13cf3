//! Error types for the backplane layer.

use thiserror::Error;

/// Result type for backplane operations.
pub type BackplaneResult<T> = Result<T, BackplaneError>;

/// Errors that can occur talking to a backplane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackplaneError {
    /// The backplane cannot be reached.
    #[error("backplane unavailable: {0}")]
    Unavailable(String),

    /// The connection's request queue has shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// A key holds a value of a different kind than the command expects.
    #[error("wrong kind of value at key {0}")]
    WrongType(String),

    /// The backplane refused the command for any other reason.
    #[error("backplane rejected command: {0}")]
    Rejected(String),
}
