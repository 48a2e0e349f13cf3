//! Demo stream node.
//!
//! [`SignalSource`] turns a synced stream entity into a synthetic signal
//! generator: once the entity is created it configures the frame geometry,
//! starts polling and publishes one noisy sine frame per poll.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use std::f64::consts::TAU;
use streamsync_backplane::{Command, Connection};
use streamsync_entity::{EntityError, EntityListener, EntityResult, EventCodec, Method, SyncedEntity};
use streamsync_types::{EntityKey, FRAME_LENGTH, FRAME_RATE};
use tracing::{debug, info, warn};

/// Peak of the uniform noise added to each sample.
pub const NOISE_PEAK: u32 = 32;

/// Generates one frame: a full sine period over `len` samples, offset to
/// the middle of the byte range, plus uniform noise, clamped to `0..=255`.
pub fn generate_frame<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let noise = f64::from(rng.gen_range(0..=NOISE_PEAK));
            let phase = TAU * i as f64 / len as f64;
            let sample = (phase.sin() + 1.0) * 128.0 + noise;
            sample.clamp(0.0, 255.0).floor() as u8
        })
        .collect()
}

/// Listener that drives a stream entity as a signal source.
#[derive(Debug)]
pub struct SignalSource {
    frame_length: i64,
    frame_rate: i64,
    rng: StdRng,
    frames_sent: u64,
}

impl SignalSource {
    pub fn new(frame_length: i64, frame_rate: i64) -> Self {
        Self::with_rng(frame_length, frame_rate, StdRng::from_entropy())
    }

    /// A source with reproducible noise.
    pub fn seeded(frame_length: i64, frame_rate: i64, seed: u64) -> Self {
        Self::with_rng(frame_length, frame_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(frame_length: i64, frame_rate: i64, rng: StdRng) -> Self {
        Self {
            frame_length,
            frame_rate,
            rng,
            frames_sent: 0,
        }
    }

    fn configure(&self, entity: &mut SyncedEntity) -> EntityResult<()> {
        entity.update(FRAME_LENGTH, self.frame_length)?;
        entity.update(FRAME_RATE, self.frame_rate)?;
        entity.start_polling()
    }
}

impl EntityListener for SignalSource {
    fn on_created(&mut self, entity: &mut SyncedEntity) {
        match self.configure(entity) {
            Ok(()) => info!(
                entity = %entity.key(),
                frame_length = self.frame_length,
                frame_rate = self.frame_rate,
                "signal source started"
            ),
            Err(e) => warn!(entity = %entity.key(), "cannot start signal source: {}", e),
        }
    }

    fn on_updated(&mut self, entity: &mut SyncedEntity, changed: &[String]) {
        for name in changed {
            if let Ok(value) = entity.get(name) {
                info!(entity = %entity.key(), field = %name, value = %value, "remote change");
            }
        }
    }

    fn on_polled(&mut self, entity: &mut SyncedEntity) {
        let len = entity
            .attributes()
            .get_integer(FRAME_LENGTH)
            .ok()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);
        if len == 0 {
            debug!(entity = %entity.key(), "skipping empty frame");
            return;
        }
        let frame = generate_frame(len, &mut self.rng);
        match entity.send_frame(frame) {
            Ok(()) => self.frames_sent += 1,
            Err(e) => warn!(entity = %entity.key(), "cannot send frame: {}", e),
        }
    }

    fn on_error(&mut self, entity: &mut SyncedEntity, error: &EntityError) {
        warn!(entity = %entity.key(), frames_sent = self.frames_sent, "backplane request failed: {}", error);
    }
}

/// Publishes an `update` envelope for `key` under `client_id`, the way a
/// remote controller would, and waits for the publish to be acknowledged.
pub async fn publish_update(
    commands: &Connection,
    key: &EntityKey,
    client_id: &str,
    field: &str,
    value: Value,
) -> EntityResult<()> {
    let mut data = Map::new();
    data.insert(field.to_string(), value);
    let event = EventCodec::new(client_id).encode(Method::Update, data)?;
    commands
        .submit(Command::publish(key.feed_channel(), event))?
        .await?;
    Ok(())
}
