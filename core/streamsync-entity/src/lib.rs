//! Backplane-synced entities for streamsync.
//!
//! A synced entity keeps a typed attribute store locally and mirrors it
//! through a [`Backplane`](streamsync_backplane::Backplane):
//!
//! - **Creation**: one atomic transaction registers the id, writes the full
//!   attribute hash and publishes a `create` envelope on the feed channel
//! - **Updates**: a local update writes one hash field and publishes an
//!   `update` envelope; remote `update` envelopes are applied locally
//! - **Echo suppression**: envelopes stamped with the entity's own client id
//!   are ignored
//! - **Polling**: a timer derived from `frameRate` tells the owner when to
//!   emit a frame on the data channel
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use streamsync_backplane::{Connection, MemoryBackplane};
//! use streamsync_entity::{EntityConfig, EntityRunner, SyncedEntity};
//! use streamsync_types::EntityId;
//!
//! # async fn demo() -> streamsync_entity::EntityResult<()> {
//! let backplane = MemoryBackplane::new();
//! let commands = Connection::open(Arc::new(backplane.clone()));
//! let config = EntityConfig::stream(EntityId::parse("c_stream")?);
//!
//! let entity = SyncedEntity::create(commands, &backplane, config).await?;
//! let (runner, handle) = EntityRunner::new(entity);
//! let task = runner.spawn();
//!
//! handle.update("frameRate", 10).await?;
//! handle.destroy().await?;
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

mod codec;
mod config;
mod entity;
mod error;
mod listener;
pub mod mirror;
mod poller;
mod runner;

pub use codec::{Envelope, EventCodec, Method};
pub use config::EntityConfig;
pub use entity::{Activity, EntityState, SyncedEntity};
pub use error::{EntityError, EntityResult};
pub use listener::{ChannelListener, EntityEvent, EntityListener};
pub use poller::Poller;
pub use runner::{EntityHandle, EntityRunner};
