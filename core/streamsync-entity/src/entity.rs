//! Synced entity — local state mirrored through the backplane.
//!
//! A [`SyncedEntity`] owns its attribute store, poll timer and feed
//! subscription. It is a single-owner value: every mutation goes through
//! `&mut self`, so whoever drives it (usually an
//! [`EntityRunner`](crate::EntityRunner)) is the only writer.
//!
//! Outbound requests are fire-and-forget. Their replies are collected
//! internally and surface through [`SyncedEntity::next_activity`] only when
//! they fail.

use crate::codec::{EventCodec, Method};
use crate::config::EntityConfig;
use crate::error::{EntityError, EntityResult};
use crate::poller::Poller;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Map;
use std::fmt;
use streamsync_backplane::{
    Backplane, BackplaneError, BackplaneResult, Command, Connection, Message, PendingReply, Reply,
    Subscription, Transaction,
};
use streamsync_types::{
    AttributeStore, AttributeValue, EntityId, EntityKey, EntitySchema, FRAME_RATE, PollInterval,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Lifecycle of a synced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Creation transaction submitted, not yet acknowledged.
    Constructing,
    /// Creation acknowledged; the entity is visible to other processes.
    Created,
    /// Torn down; no further local or remote effects.
    Destroyed,
}

/// Something that happened to an entity and needs its driver's attention.
#[derive(Debug)]
pub enum Activity {
    /// The creation transaction was acknowledged.
    Created,
    /// The creation transaction failed; the entity stays in `Constructing`.
    CreationFailed(EntityError),
    /// A message arrived on the feed channel.
    Feed(Message),
    /// The poll timer fired.
    Poll,
    /// A fire-and-forget request failed.
    RequestFailed(BackplaneError),
    /// The feed subscription ended.
    FeedClosed,
}

/// An entity whose attributes are mirrored on the backplane.
pub struct SyncedEntity {
    key: EntityKey,
    schema: EntitySchema,
    store: AttributeStore,
    interval: PollInterval,
    codec: EventCodec,
    commands: Connection,
    feed: Option<Subscription>,
    state: EntityState,
    creation: Option<PendingReply>,
    in_flight: FuturesUnordered<PendingReply>,
    poller: Poller,
    polling: bool,
    poll_generation: u64,
    tick_sender: mpsc::UnboundedSender<u64>,
    ticks: mpsc::UnboundedReceiver<u64>,
}

impl SyncedEntity {
    /// Creates an entity and announces it on the backplane.
    ///
    /// The feed channel is subscribed on `subscriber` first; if that fails,
    /// nothing is sent. Then one atomic transaction registers the id in the
    /// type's registry set, writes the full attribute hash and publishes a
    /// `create` envelope. The entity starts in [`EntityState::Constructing`]
    /// and moves to `Created` once the transaction is acknowledged (see
    /// [`Self::next_activity`] and [`Self::wait_created`]).
    ///
    /// Initial attributes are validated against the schema exactly like
    /// [`Self::update`]; on failure nothing is sent.
    pub async fn create(
        commands: Connection,
        subscriber: &dyn Backplane,
        config: EntityConfig,
    ) -> EntityResult<Self> {
        let client_id = config.effective_client_id();
        let EntityConfig {
            schema,
            id,
            attributes,
            ..
        } = config;

        let mut store = schema.defaults();
        let mut interval = match store.get(FRAME_RATE) {
            Ok(rate) => interval_for(FRAME_RATE, rate)?,
            Err(_) => PollInterval::default(),
        };
        for attribute in attributes {
            if let Some(derived) = validate(&schema, &attribute.name, &attribute.value)? {
                interval = derived;
            }
            store.set(attribute.name, attribute.value);
        }

        let key = EntityKey::new(schema.type_name.clone(), id);
        let codec = EventCodec::new(client_id);
        let announcement = codec.encode(Method::Create, store.to_json())?;

        let mut transaction =
            Transaction::new().push(Command::set_add(key.registry_key(), key.id().as_str()));
        if !store.is_empty() {
            transaction = transaction.push(Command::hash_set_all(
                key.mirror_key(),
                store.to_wire_fields(),
            ));
        }
        transaction = transaction.push(Command::publish(key.feed_channel(), announcement));

        // A failed subscription must leave nothing committed.
        let feed = subscriber.subscribe(&key.feed_channel()).await?;
        let creation = commands.submit_atomic(transaction)?;
        debug!(entity = %key, client_id = codec.client_id(), "creation submitted");

        let (tick_sender, ticks) = mpsc::unbounded_channel();
        Ok(Self {
            poller: Poller::new(interval.as_duration()),
            key,
            schema,
            store,
            interval,
            codec,
            commands,
            feed: Some(feed),
            state: EntityState::Constructing,
            creation: Some(creation),
            in_flight: FuturesUnordered::new(),
            polling: false,
            poll_generation: 0,
            tick_sender,
            ticks,
        })
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn id(&self) -> &EntityId {
        self.key.id()
    }

    pub fn type_name(&self) -> &str {
        self.key.type_name()
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// The full local attribute state.
    pub fn attributes(&self) -> &AttributeStore {
        &self.store
    }

    /// Looks up one attribute.
    pub fn get(&self, name: &str) -> EntityResult<&AttributeValue> {
        Ok(self.store.get(name)?)
    }

    /// The poll interval currently derived from the frame rate.
    pub fn interval(&self) -> PollInterval {
        self.interval
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// Identity stamped into this entity's envelopes.
    pub fn client_id(&self) -> &str {
        self.codec.client_id()
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    // ── Local operations ─────────────────────────────────────────

    /// Sets an attribute locally and propagates it.
    ///
    /// Unknown fields, values of the wrong type and out-of-range frame rates
    /// are rejected before anything is sent. On success the mirror write and
    /// the `update` envelope are queued on the command connection without
    /// waiting for either.
    pub fn update(&mut self, field: &str, value: impl Into<AttributeValue>) -> EntityResult<()> {
        self.ensure_live()?;
        let value = value.into();
        let interval = validate(&self.schema, field, &value)?;

        let mut data = Map::new();
        data.insert(field.to_string(), value.to_json());
        let event = self.codec.encode(Method::Update, data)?;
        let mirror = Command::hash_set(self.key.mirror_key(), field, value.serialize());

        debug!(entity = %self.key, field, value = %value, "updating");
        self.apply(field, value, interval);

        let pending = self.commands.submit(mirror)?;
        self.in_flight.push(pending);
        let pending = self
            .commands
            .submit(Command::publish(self.key.feed_channel(), event))?;
        self.in_flight.push(pending);
        Ok(())
    }

    /// Publishes a raw frame on the data channel.
    ///
    /// The buffer moves into the publish request and is dropped once the
    /// request completes.
    pub fn send_frame(&mut self, frame: Vec<u8>) -> EntityResult<()> {
        self.ensure_live()?;
        trace!(entity = %self.key, bytes = frame.len(), "sending frame");
        let pending = self
            .commands
            .submit(Command::publish(self.key.data_channel(), frame))?;
        self.in_flight.push(pending);
        Ok(())
    }

    /// Arms the poll timer at the current interval.
    pub fn start_polling(&mut self) -> EntityResult<()> {
        match self.state {
            EntityState::Constructing => return Err(EntityError::NotCreated(self.key.to_string())),
            EntityState::Destroyed => return Err(EntityError::Destroyed(self.key.to_string())),
            EntityState::Created => {}
        }
        self.poll_generation += 1;
        let generation = self.poll_generation;
        let ticks = self.tick_sender.clone();
        self.poller.start(self.interval.as_duration(), move || {
            let _ = ticks.send(generation);
        });
        self.polling = true;
        debug!(entity = %self.key, interval = ?self.interval.as_duration(), "polling started");
        Ok(())
    }

    /// Disarms the poll timer. Ticks already queued are discarded.
    pub fn stop_polling(&mut self) {
        self.poller.stop();
        self.poll_generation += 1;
        if self.polling {
            debug!(entity = %self.key, "polling stopped");
        }
        self.polling = false;
    }

    // ── Inbound events ───────────────────────────────────────────

    /// Handles a raw feed payload and returns the names of the attributes it
    /// changed.
    ///
    /// Malformed payloads, this entity's own envelopes, methods other than
    /// `update`, and envelopes without a `data` object change nothing.
    /// Unknown fields and unacceptable values are skipped individually.
    pub fn on_message(&mut self, raw: &[u8]) -> Vec<String> {
        if self.state == EntityState::Destroyed {
            return Vec::new();
        }
        let envelope = match EventCodec::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(entity = %self.key, "discarding malformed feed event: {}", e);
                return Vec::new();
            }
        };
        if self.codec.is_own(&envelope) {
            trace!(entity = %self.key, "dropping own echo");
            return Vec::new();
        }
        if envelope.method != Method::Update {
            debug!(entity = %self.key, method = %envelope.method, "ignoring feed event");
            return Vec::new();
        }
        let Some(data) = envelope.data_object() else {
            debug!(entity = %self.key, "update without data object");
            return Vec::new();
        };

        let mut applied = Vec::new();
        for (name, json) in data {
            let Some(def) = self.schema.get(name) else {
                debug!(entity = %self.key, field = %name, "ignoring unknown field");
                continue;
            };
            let value = match AttributeValue::from_json(def.ty(), json) {
                Ok(value) => value,
                Err(e) => {
                    warn!(entity = %self.key, field = %name, "ignoring remote value: {}", e);
                    continue;
                }
            };
            let interval = match validate(&self.schema, name, &value) {
                Ok(interval) => interval,
                Err(e) => {
                    warn!(entity = %self.key, field = %name, "ignoring remote value: {}", e);
                    continue;
                }
            };
            info!(
                entity = %self.key,
                from = %envelope.client_id,
                field = %name,
                value = %value,
                "applied remote update"
            );
            self.apply(name, value, interval);
            applied.push(name.clone());
        }
        applied
    }

    // ── Driving ──────────────────────────────────────────────────

    /// Waits for the next activity the driver must handle.
    ///
    /// Successful request completions and stale poll ticks are absorbed
    /// here. Returns `None` once the entity is destroyed. Cancel-safe.
    pub async fn next_activity(&mut self) -> Option<Activity> {
        loop {
            if self.state == EntityState::Destroyed {
                return None;
            }
            tokio::select! {
                biased;
                ack = wait_for(&mut self.creation) => {
                    self.creation = None;
                    return Some(match ack {
                        Ok(_) => {
                            self.mark_created();
                            Activity::Created
                        }
                        Err(e) => Activity::CreationFailed(e.into()),
                    });
                }
                Some(done) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = done {
                        return Some(Activity::RequestFailed(e));
                    }
                }
                message = recv_from(&mut self.feed) => {
                    return Some(match message {
                        Some(message) => Activity::Feed(message),
                        None => {
                            self.feed = None;
                            Activity::FeedClosed
                        }
                    });
                }
                Some(generation) = self.ticks.recv() => {
                    if self.polling && generation == self.poll_generation {
                        return Some(Activity::Poll);
                    }
                    trace!(entity = %self.key, "dropping stale poll tick");
                }
            }
        }
    }

    /// Waits until the creation transaction is acknowledged.
    pub async fn wait_created(&mut self) -> EntityResult<()> {
        match self.state {
            EntityState::Created => return Ok(()),
            EntityState::Destroyed => return Err(EntityError::Destroyed(self.key.to_string())),
            EntityState::Constructing => {}
        }
        let pending = self
            .creation
            .take()
            .ok_or_else(|| EntityError::NotCreated(self.key.to_string()))?;
        pending.await?;
        self.mark_created();
        Ok(())
    }

    /// Waits for every outstanding fire-and-forget request and reports the
    /// first failure.
    pub async fn flush(&mut self) -> EntityResult<()> {
        let mut first_error = None;
        while let Some(result) = self.in_flight.next().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Tears the entity down.
    ///
    /// Stops polling, unsubscribes from the feed, then atomically removes the
    /// id from the registry, deletes the attribute hash and publishes a
    /// `delete` envelope. The entity is `Destroyed` afterwards even if the
    /// backplane rejects the transaction; the error is still returned.
    /// Destroying twice is a no-op.
    pub async fn destroy(&mut self) -> EntityResult<()> {
        if self.state == EntityState::Destroyed {
            return Ok(());
        }
        self.stop_polling();
        self.feed = None;
        self.creation = None;
        self.state = EntityState::Destroyed;

        let farewell = self.codec.encode(Method::Delete, Map::new())?;
        let transaction = Transaction::new()
            .push(Command::set_remove(self.key.registry_key(), self.key.id().as_str()))
            .push(Command::delete(self.key.mirror_key()))
            .push(Command::publish(self.key.feed_channel(), farewell));
        let result = self.commands.submit_atomic(transaction)?.await;
        // Earlier requests on the connection have completed by now.
        self.in_flight = FuturesUnordered::new();
        result?;
        info!(entity = %self.key, "destroyed");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn mark_created(&mut self) {
        self.state = EntityState::Created;
        info!(entity = %self.key, "created");
    }

    fn ensure_live(&self) -> EntityResult<()> {
        if self.state == EntityState::Destroyed {
            return Err(EntityError::Destroyed(self.key.to_string()));
        }
        Ok(())
    }

    fn apply(&mut self, field: &str, value: AttributeValue, interval: Option<PollInterval>) {
        self.store.set(field, value);
        if let Some(interval) = interval {
            self.interval = interval;
            self.poller.set_interval(interval.as_duration());
        }
    }
}

impl fmt::Debug for SyncedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedEntity")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("attributes", &self.store)
            .field("interval", &self.interval)
            .field("polling", &self.polling)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

/// Checks `value` against the schema's declaration of `field`. Returns the
/// new poll interval when `field` is the frame rate.
fn validate(
    schema: &EntitySchema,
    field: &str,
    value: &AttributeValue,
) -> EntityResult<Option<PollInterval>> {
    let def = schema
        .get(field)
        .ok_or_else(|| EntityError::UnknownField(field.to_string()))?;
    if def.ty() != value.ty() {
        return Err(EntityError::TypeMismatch {
            field: field.to_string(),
            expected: def.ty(),
            found: value.ty(),
        });
    }
    if field == FRAME_RATE {
        return interval_for(field, value).map(Some);
    }
    Ok(None)
}

fn interval_for(field: &str, rate: &AttributeValue) -> EntityResult<PollInterval> {
    let invalid = |reason: String| EntityError::InvalidValue {
        field: field.to_string(),
        reason,
    };
    let rate = rate
        .as_integer()
        .ok_or_else(|| invalid(format!("expected an integer, got {}", rate.ty())))?;
    PollInterval::from_frame_rate(rate).map_err(|e| invalid(e.to_string()))
}

async fn wait_for(pending: &mut Option<PendingReply>) -> BackplaneResult<Reply> {
    match pending {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

async fn recv_from(feed: &mut Option<Subscription>) -> Option<Message> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}
