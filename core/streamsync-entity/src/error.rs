//! Error types for synced entities.

use streamsync_backplane::BackplaneError;
use streamsync_types::AttributeType;
use thiserror::Error;

/// Result type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

/// Errors that can occur operating a synced entity.
#[derive(Debug, Error)]
pub enum EntityError {
    /// The field is not declared by the entity's schema.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// The value's type does not match the declared type.
    #[error("field {field} expects a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: AttributeType,
        found: AttributeType,
    },

    /// The value has the right type but is not acceptable.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A feed payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attribute or id error from the types layer.
    #[error(transparent)]
    Types(#[from] streamsync_types::Error),

    /// The backplane failed or could not be reached.
    #[error("backplane error: {0}")]
    Backplane(#[from] BackplaneError),

    /// The operation needs an acknowledged entity.
    #[error("entity {0} is not created yet")]
    NotCreated(String),

    /// The entity has been torn down.
    #[error("entity {0} has been destroyed")]
    Destroyed(String),

    /// The entity's runner has stopped.
    #[error("channel closed")]
    ChannelClosed,
}
