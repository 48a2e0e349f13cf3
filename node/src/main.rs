//! Streamsync demo node
//!
//! Runs one stream entity on an in-process backplane, or on a Redis server
//! when `--backplane-url` is given:
//! 1. The entity is created and announced
//! 2. A signal source configures it and publishes a frame per poll
//! 3. A controller with its own client id retunes the frame rate
//! 4. An observer counts frames on the data channel
//!
//! Usage:
//!   streamsync-node --frame-rate 10 --duration 5
//!   streamsync-node --backplane-url redis://127.0.0.1:6379/

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use streamsync_backplane::{Backplane, Connection, MemoryBackplane, RedisBackplane, Subscription};
use streamsync_entity::{EntityConfig, EntityRunner, SyncedEntity};
use streamsync_node::{SignalSource, publish_update};
use streamsync_types::{DIMENSIONS, EntityId, EntityKey, EntitySchema, FRAME_RATE};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONTROLLER_ID: &str = "controller";

#[derive(Parser, Debug)]
#[command(name = "streamsync-node")]
#[command(about = "Publish a synthetic signal as a synced stream entity")]
struct Args {
    /// Entity id
    #[arg(long, default_value = "c_stream")]
    id: String,

    /// Entity type name (registry key)
    #[arg(long, default_value = "stream")]
    type_name: String,

    /// Samples per frame
    #[arg(long, default_value = "256")]
    frame_length: i64,

    /// Frames per second
    #[arg(long, default_value = "10")]
    frame_rate: i64,

    /// Number of signal dimensions
    #[arg(long, default_value = "1")]
    dimensions: i64,

    /// Frame rate the controller switches to
    #[arg(long, default_value = "20")]
    controller_rate: i64,

    /// Seconds before the controller acts
    #[arg(long, default_value = "2")]
    controller_delay: u64,

    /// Redis backplane URL; runs on an in-process backplane when omitted
    #[arg(long)]
    backplane_url: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration: Option<u64>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = if args.verbose {
        EnvFilter::new(Level::DEBUG.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("streamsync node starting...");
    let id = EntityId::parse(&args.id).context("invalid entity id")?;
    let schema = EntitySchema {
        type_name: args.type_name.clone(),
        ..EntitySchema::stream()
    };
    let key = EntityKey::new(schema.type_name.clone(), id.clone());

    let backplane: Arc<dyn Backplane> = match &args.backplane_url {
        Some(url) => {
            info!(url = %url, "using redis backplane");
            Arc::new(
                RedisBackplane::connect(url)
                    .await
                    .context("connecting to redis backplane")?,
            )
        }
        None => Arc::new(MemoryBackplane::new()),
    };
    let commands = Connection::open(backplane.clone());

    let frames = Arc::new(AtomicU64::new(0));
    let pipe = backplane
        .subscribe(&key.data_channel())
        .await
        .context("subscribing to data channel")?;
    tokio::spawn(observe_frames(pipe, frames.clone()));

    let config = EntityConfig::new(schema, id).with_attribute(DIMENSIONS, args.dimensions);
    let entity = SyncedEntity::create(commands.clone(), backplane.as_ref(), config)
        .await
        .context("creating stream entity")?;
    let (runner, handle) = EntityRunner::new(entity);
    let mut task = runner
        .with_listener(SignalSource::new(args.frame_length, args.frame_rate))
        .spawn();

    let controller_key = key.clone();
    let controller_rate = args.controller_rate;
    let controller_delay = Duration::from_secs(args.controller_delay);
    tokio::spawn(async move {
        tokio::time::sleep(controller_delay).await;
        info!(rate = controller_rate, "controller retuning frame rate");
        if let Err(e) = publish_update(
            &commands,
            &controller_key,
            CONTROLLER_ID,
            FRAME_RATE,
            json!(controller_rate),
        )
        .await
        {
            warn!("controller update failed: {}", e);
        }
    });

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = &mut task => {
            result.context("entity runner panicked")?.context("entity runner failed")?;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = deadline => info!("run time elapsed"),
    }

    if let Ok(attributes) = handle.attributes().await {
        debug!(?attributes, "final attributes");
    }
    handle.destroy().await.context("destroying stream entity")?;
    task.await
        .context("entity runner panicked")?
        .context("entity runner failed")?;

    info!(entity = %key, frames = frames.load(Ordering::Relaxed), "node stopped");
    Ok(())
}

async fn observe_frames(mut pipe: Subscription, frames: Arc<AtomicU64>) {
    while let Some(message) = pipe.recv().await {
        let count = frames.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(bytes = message.payload.len(), count, "frame observed");
    }
}
