//! Actor driving one synced entity.
//!
//! The runner owns the [`SyncedEntity`] and multiplexes its activity (feed
//! messages, poll ticks, request completions) with control requests arriving
//! through cloned [`EntityHandle`]s. All state changes happen on the
//! runner's task.

use crate::entity::{Activity, SyncedEntity};
use crate::error::{EntityError, EntityResult};
use crate::listener::EntityListener;
use streamsync_backplane::BackplaneError;
use streamsync_types::{AttributeStore, AttributeValue, EntityKey};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CONTROL_CAPACITY: usize = 64;

enum Control {
    Update {
        field: String,
        value: AttributeValue,
        reply: oneshot::Sender<EntityResult<()>>,
    },
    SendFrame {
        frame: Vec<u8>,
        reply: oneshot::Sender<EntityResult<()>>,
    },
    StartPolling {
        reply: oneshot::Sender<EntityResult<()>>,
    },
    StopPolling {
        reply: oneshot::Sender<()>,
    },
    Attributes {
        reply: oneshot::Sender<AttributeStore>,
    },
    Destroy {
        reply: oneshot::Sender<EntityResult<()>>,
    },
}

/// Drives a [`SyncedEntity`] and dispatches its lifecycle to listeners.
pub struct EntityRunner {
    entity: SyncedEntity,
    listeners: Vec<Box<dyn EntityListener>>,
    control: mpsc::Receiver<Control>,
}

impl EntityRunner {
    /// Wraps `entity`, returning the runner and a handle to control it.
    pub fn new(entity: SyncedEntity) -> (Self, EntityHandle) {
        let (sender, control) = mpsc::channel(CONTROL_CAPACITY);
        let handle = EntityHandle {
            key: entity.key().clone(),
            sender,
        };
        let runner = Self {
            entity,
            listeners: Vec::new(),
            control,
        };
        (runner, handle)
    }

    pub fn add_listener(&mut self, listener: Box<dyn EntityListener>) {
        self.listeners.push(listener);
    }

    pub fn with_listener(mut self, listener: impl EntityListener + 'static) -> Self {
        self.add_listener(Box::new(listener));
        self
    }

    /// Spawns [`Self::run`] on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<EntityResult<()>> {
        tokio::spawn(self.run())
    }

    /// Runs until the entity is destroyed.
    ///
    /// Returns an error if creation fails or the feed subscription ends.
    /// Dropping every handle does not stop the runner; the entity keeps
    /// reacting to its feed and timer.
    pub async fn run(mut self) -> EntityResult<()> {
        info!(entity = %self.entity.key(), "entity runner started");
        let mut control_open = true;
        loop {
            tokio::select! {
                control = self.control.recv(), if control_open => match control {
                    Some(control) => self.handle_control(control).await,
                    None => {
                        debug!(entity = %self.entity.key(), "all handles dropped");
                        control_open = false;
                    }
                },
                activity = self.entity.next_activity() => match activity {
                    Some(activity) => self.handle_activity(activity)?,
                    None => break,
                },
            }
        }
        info!(entity = %self.entity.key(), "entity runner stopped");
        Ok(())
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::Update { field, value, reply } => {
                let _ = reply.send(self.entity.update(&field, value));
            }
            Control::SendFrame { frame, reply } => {
                let _ = reply.send(self.entity.send_frame(frame));
            }
            Control::StartPolling { reply } => {
                let _ = reply.send(self.entity.start_polling());
            }
            Control::StopPolling { reply } => {
                self.entity.stop_polling();
                let _ = reply.send(());
            }
            Control::Attributes { reply } => {
                let _ = reply.send(self.entity.attributes().clone());
            }
            Control::Destroy { reply } => {
                let _ = reply.send(self.entity.destroy().await);
            }
        }
    }

    fn handle_activity(&mut self, activity: Activity) -> EntityResult<()> {
        match activity {
            Activity::Created => {
                for listener in &mut self.listeners {
                    listener.on_created(&mut self.entity);
                }
            }
            Activity::CreationFailed(e) => {
                error!(entity = %self.entity.key(), "creation failed: {}", e);
                return Err(e);
            }
            Activity::Feed(message) => {
                let changed = self.entity.on_message(&message.payload);
                if !changed.is_empty() {
                    for listener in &mut self.listeners {
                        listener.on_updated(&mut self.entity, &changed);
                    }
                }
            }
            Activity::Poll => {
                for listener in &mut self.listeners {
                    listener.on_polled(&mut self.entity);
                }
            }
            Activity::RequestFailed(e) => {
                warn!(entity = %self.entity.key(), "request failed: {}", e);
                let e = EntityError::from(e);
                for listener in &mut self.listeners {
                    listener.on_error(&mut self.entity, &e);
                }
            }
            Activity::FeedClosed => {
                error!(entity = %self.entity.key(), "feed subscription closed");
                return Err(BackplaneError::ConnectionClosed.into());
            }
        }
        Ok(())
    }
}

/// Cloneable handle for controlling a running entity.
///
/// Every method fails with [`EntityError::ChannelClosed`] once the runner
/// has stopped.
#[derive(Debug, Clone)]
pub struct EntityHandle {
    key: EntityKey,
    sender: mpsc::Sender<Control>,
}

impl EntityHandle {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub async fn update(
        &self,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> EntityResult<()> {
        let (field, value) = (field.into(), value.into());
        self.request(|reply| Control::Update { field, value, reply })
            .await?
    }

    pub async fn send_frame(&self, frame: Vec<u8>) -> EntityResult<()> {
        self.request(|reply| Control::SendFrame { frame, reply })
            .await?
    }

    pub async fn start_polling(&self) -> EntityResult<()> {
        self.request(|reply| Control::StartPolling { reply }).await?
    }

    pub async fn stop_polling(&self) -> EntityResult<()> {
        self.request(|reply| Control::StopPolling { reply }).await
    }

    /// A snapshot of the entity's current attributes.
    pub async fn attributes(&self) -> EntityResult<AttributeStore> {
        self.request(|reply| Control::Attributes { reply }).await
    }

    pub async fn destroy(&self) -> EntityResult<()> {
        self.request(|reply| Control::Destroy { reply }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Control,
    ) -> EntityResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| EntityError::ChannelClosed)?;
        response.await.map_err(|_| EntityError::ChannelClosed)
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Update { .. } => "Update",
            Self::SendFrame { .. } => "SendFrame",
            Self::StartPolling { .. } => "StartPolling",
            Self::StopPolling { .. } => "StopPolling",
            Self::Attributes { .. } => "Attributes",
            Self::Destroy { .. } => "Destroy",
        };
        f.write_str(name)
    }
}
