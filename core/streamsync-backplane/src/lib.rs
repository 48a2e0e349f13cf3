//! Backplane seam for streamsync.
//!
//! The backplane is the shared key-value + publish/subscribe substrate that
//! entities mirror their attributes into and broadcast events through.
//!
//! ## Components
//!
//! - **Command**: the handful of operations entities need (set add/remove,
//!   hash write, key delete, publish) and their replies
//! - **Backplane**: async trait any substrate implements
//! - **MemoryBackplane**: in-process implementation, shared by cloning
//! - **RedisBackplane**: Redis server, for entities spread over processes
//! - **Connection**: FIFO request queue in front of a backplane; requests
//!   own their payloads until their reply is produced
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use streamsync_backplane::{Command, Connection, MemoryBackplane};
//!
//! # async fn demo() -> streamsync_backplane::BackplaneResult<()> {
//! let backplane = MemoryBackplane::new();
//! let conn = Connection::open(Arc::new(backplane.clone()));
//!
//! // Fire and forget: the reply is dropped.
//! conn.submit(Command::set_add("stream", "c_stream"))?;
//!
//! // Or wait for it.
//! conn.submit(Command::publish("stream:c_stream:feed", b"{}".to_vec()))?.await?;
//! # Ok(())
//! # }
//! ```

mod backplane;
mod command;
mod connection;
mod error;
mod memory;
mod redis_backplane;

pub use backplane::{Backplane, Message, Subscription};
pub use command::{Command, Reply, Transaction};
pub use connection::{Connection, PendingReply};
pub use error::{BackplaneError, BackplaneResult};
pub use memory::MemoryBackplane;
pub use redis_backplane::RedisBackplane;
