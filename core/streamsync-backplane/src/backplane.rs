//! Backplane trait abstraction.
//!
//! Defines the operations the sync layer needs from a key-value +
//! publish/subscribe substrate, so entities work against any backend.

use crate::command::{Command, Reply, Transaction};
use crate::error::BackplaneResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;

/// A message delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Channel the message was published on.
    pub channel: String,
    /// Raw payload.
    pub payload: Vec<u8>,
}

/// A live subscription to one channel.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    /// Wraps a backend-specific delivery queue.
    pub fn new(channel: impl Into<String>, receiver: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    /// The subscribed channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receives the next message.
    /// Returns `None` once the backplane side has gone away.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}

/// A key-value + publish/subscribe backplane.
#[async_trait]
pub trait Backplane: Send + Sync {
    /// Executes a single command.
    async fn execute(&self, command: Command) -> BackplaneResult<Reply>;

    /// Executes every command of `transaction` atomically and returns a
    /// [`Reply::Multi`] with one reply per command.
    async fn execute_atomic(&self, transaction: Transaction) -> BackplaneResult<Reply>;

    /// Subscribes to a channel.
    async fn subscribe(&self, channel: &str) -> BackplaneResult<Subscription>;

    /// Reads every field of a hash (`HGETALL`). Missing keys read as empty.
    async fn hash_fields(&self, key: &str) -> BackplaneResult<BTreeMap<String, String>>;

    /// Reads every member of a set (`SMEMBERS`). Missing keys read as empty.
    async fn set_members(&self, key: &str) -> BackplaneResult<BTreeSet<String>>;
}
