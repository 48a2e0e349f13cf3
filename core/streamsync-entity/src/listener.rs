//! Lifecycle callbacks for synced entities.

use crate::entity::SyncedEntity;
use crate::error::EntityError;
use tokio::sync::mpsc;

/// Receives lifecycle notifications from an [`EntityRunner`](crate::EntityRunner).
///
/// Every method has a no-op default. Callbacks run on the runner's task with
/// exclusive access to the entity, so they may call back into it (update an
/// attribute, start polling, send a frame) without locking.
pub trait EntityListener: Send {
    /// The creation transaction was acknowledged.
    fn on_created(&mut self, entity: &mut SyncedEntity) {
        let _ = entity;
    }

    /// A remote `update` envelope changed `changed`. Local updates do not
    /// trigger this.
    fn on_updated(&mut self, entity: &mut SyncedEntity, changed: &[String]) {
        let _ = (entity, changed);
    }

    /// The poll timer fired.
    fn on_polled(&mut self, entity: &mut SyncedEntity) {
        let _ = entity;
    }

    /// A fire-and-forget request failed.
    fn on_error(&mut self, entity: &mut SyncedEntity, error: &EntityError) {
        let _ = (entity, error);
    }
}

/// A lifecycle notification forwarded by [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityEvent {
    Created,
    Updated(Vec<String>),
    Polled,
    Error(String),
}

/// Forwards every notification into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    events: mpsc::UnboundedSender<EntityEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EntityEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    fn forward(&self, event: EntityEvent) {
        let _ = self.events.send(event);
    }
}

impl EntityListener for ChannelListener {
    fn on_created(&mut self, _entity: &mut SyncedEntity) {
        self.forward(EntityEvent::Created);
    }

    fn on_updated(&mut self, _entity: &mut SyncedEntity, changed: &[String]) {
        self.forward(EntityEvent::Updated(changed.to_vec()));
    }

    fn on_polled(&mut self, _entity: &mut SyncedEntity) {
        self.forward(EntityEvent::Polled);
    }

    fn on_error(&mut self, _entity: &mut SyncedEntity, error: &EntityError) {
        self.forward(EntityEvent::Error(error.to_string()));
    }
}
