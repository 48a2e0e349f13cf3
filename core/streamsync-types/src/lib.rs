//! Core type definitions for streamsync.
//!
//! This crate defines the plain data types shared by every other crate:
//! - Entity identifiers and the backplane naming convention ([`EntityKey`])
//! - Typed attribute values and the per-entity [`AttributeStore`]
//! - Entity schemas, including the built-in `stream` schema
//! - The poll interval derived from an entity's frame rate
//!
//! Nothing here performs I/O.

mod attribute;
mod ids;
mod interval;
mod schema;

pub use attribute::{Attribute, AttributeStore, AttributeType, AttributeValue};
pub use ids::{EntityId, EntityKey};
pub use interval::{MAX_FRAME_RATE, PollInterval};
pub use schema::{AttributeDef, EntitySchema, DIMENSIONS, FRAME_LENGTH, FRAME_RATE, STREAM_TYPE};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("attribute not found: {0}")]
    NotFound(String),

    #[error("cannot parse {input:?} as {ty}: {reason}")]
    Parse {
        ty: AttributeType,
        input: String,
        reason: String,
    },

    #[error("invalid entity id {0:?}")]
    InvalidId(String),

    #[error("frame rate must be between 1 and 1000000, got {0}")]
    InvalidFrameRate(i64),
}
