//! Redis backplane.
//!
//! Commands share one multiplexed connection. Every subscription gets its
//! own pub/sub connection, forwarded into the [`Subscription`] queue by a
//! background task that stops once the subscription is dropped.
//!
//! Transactions run as `MULTI`/`EXEC`: other clients never observe a
//! partial transaction, but a command the server rejects mid-transaction
//! does not roll back the ones before it.

use crate::backplane::{Backplane, Message, Subscription};
use crate::command::{Command, Reply, Transaction};
use crate::error::{BackplaneError, BackplaneResult};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// A backplane backed by a Redis server.
#[derive(Clone)]
pub struct RedisBackplane {
    url: String,
    client: Client,
    commands: MultiplexedConnection,
}

impl std::fmt::Debug for RedisBackplane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackplane")
            .field("url", &self.url)
            .finish()
    }
}

impl RedisBackplane {
    /// Connects to the server at `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> BackplaneResult<Self> {
        let client = Client::open(url).map_err(|e| BackplaneError::Unavailable(e.to_string()))?;
        let commands = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BackplaneError::Unavailable(e.to_string()))?;
        debug!(url, "connected to redis backplane");
        Ok(Self {
            url: url.to_string(),
            client,
            commands,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn to_cmd(command: &Command) -> redis::Cmd {
    match command {
        Command::SetAdd { key, member } => {
            let mut cmd = redis::cmd("SADD");
            cmd.arg(key).arg(member);
            cmd
        }
        Command::SetRemove { key, member } => {
            let mut cmd = redis::cmd("SREM");
            cmd.arg(key).arg(member);
            cmd
        }
        Command::HashSet { key, fields } => {
            let mut cmd = redis::cmd("HSET");
            cmd.arg(key);
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
            cmd
        }
        Command::Delete { key } => {
            let mut cmd = redis::cmd("DEL");
            cmd.arg(key);
            cmd
        }
        Command::Publish { channel, payload } => {
            let mut cmd = redis::cmd("PUBLISH");
            cmd.arg(channel).arg(payload.as_slice());
            cmd
        }
    }
}

/// Key (or channel) a command addresses, for error reporting.
fn target(command: &Command) -> &str {
    match command {
        Command::SetAdd { key, .. }
        | Command::SetRemove { key, .. }
        | Command::HashSet { key, .. }
        | Command::Delete { key } => key,
        Command::Publish { channel, .. } => channel,
    }
}

fn to_reply(value: redis::Value) -> Reply {
    match value {
        redis::Value::Int(n) => Reply::Integer(n),
        _ => Reply::Ok,
    }
}

/// Maps a client error onto the backplane's error kinds.
fn classify(error: RedisError, key: &str) -> BackplaneError {
    if error.code() == Some("WRONGTYPE") {
        BackplaneError::WrongType(key.to_string())
    } else if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        BackplaneError::Unavailable(error.to_string())
    } else {
        BackplaneError::Rejected(error.to_string())
    }
}

#[async_trait]
impl Backplane for RedisBackplane {
    async fn execute(&self, command: Command) -> BackplaneResult<Reply> {
        trace!(command = command.name(), key = target(&command), "redis execute");
        let mut conn = self.commands.clone();
        let value: redis::Value = to_cmd(&command)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(e, target(&command)))?;
        Ok(to_reply(value))
    }

    async fn execute_atomic(&self, transaction: Transaction) -> BackplaneResult<Reply> {
        if transaction.is_empty() {
            return Ok(Reply::Multi(Vec::new()));
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in transaction.commands() {
            pipe.add_command(to_cmd(command));
        }
        trace!(commands = transaction.len(), "redis transaction");

        let mut conn = self.commands.clone();
        let first = target(&transaction.commands()[0]).to_string();
        let values: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(e, &first))?;
        Ok(Reply::Multi(values.into_iter().map(to_reply).collect()))
    }

    async fn subscribe(&self, channel: &str) -> BackplaneResult<Subscription> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| classify(e, channel))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| classify(e, channel))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let name = channel.to_string();
        tokio::spawn(async move {
            let mut messages = std::pin::pin!(pubsub.into_on_message());
            loop {
                tokio::select! {
                    _ = sender.closed() => break,
                    next = messages.next() => match next {
                        Some(msg) => {
                            let message = Message {
                                channel: msg.get_channel_name().to_string(),
                                payload: msg.get_payload_bytes().to_vec(),
                            };
                            if sender.send(message).is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!(channel = %name, "redis subscription stream ended");
                            break;
                        }
                    },
                }
            }
            trace!(channel = %name, "redis subscription closed");
        });

        Ok(Subscription::new(channel, receiver))
    }

    async fn hash_fields(&self, key: &str) -> BackplaneResult<BTreeMap<String, String>> {
        let mut conn = self.commands.clone();
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(e, key))
    }

    async fn set_members(&self, key: &str) -> BackplaneResult<BTreeSet<String>> {
        let mut conn = self.commands.clone();
        redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| classify(e, key))
    }
}
