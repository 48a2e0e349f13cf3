//! In-process backplane.
//!
//! Every clone of a [`MemoryBackplane`] shares the same keyspace and
//! channels, so clones behave like separate client connections to one
//! server. All state lives behind a single lock, which makes transactions
//! trivially atomic.

use crate::backplane::{Backplane, Message, Subscription};
use crate::command::{Command, Reply, Transaction};
use crate::error::{BackplaneError, BackplaneResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

#[derive(Debug)]
enum Value {
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Message>>>,
}

/// A shared in-process backplane.
#[derive(Debug, Clone)]
pub struct MemoryBackplane {
    state: Arc<Mutex<State>>,
    online: Arc<AtomicBool>,
}

impl MemoryBackplane {
    /// Creates an empty, reachable backplane.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Marks the backplane reachable or unreachable. While unreachable every
    /// operation fails with [`BackplaneError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether the backplane is currently reachable.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let state = self.state.lock().await;
        state
            .subscribers
            .get(channel)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }

    fn ensure_online(&self) -> BackplaneResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(BackplaneError::Unavailable("memory backplane is offline".into()))
        }
    }
}

impl Default for MemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Rejects commands that would touch a key of the wrong kind.
    fn check(&self, command: &Command) -> BackplaneResult<()> {
        let conflict = match command {
            Command::SetAdd { key, .. } | Command::SetRemove { key, .. } => {
                matches!(self.keys.get(key), Some(Value::Hash(_))).then_some(key)
            }
            Command::HashSet { key, .. } => {
                matches!(self.keys.get(key), Some(Value::Set(_))).then_some(key)
            }
            Command::Delete { .. } | Command::Publish { .. } => None,
        };
        match conflict {
            Some(key) => Err(BackplaneError::WrongType(key.clone())),
            None => Ok(()),
        }
    }

    fn apply(&mut self, command: Command) -> Reply {
        trace!(command = command.name(), "applying");
        match command {
            Command::SetAdd { key, member } => {
                let entry = self
                    .keys
                    .entry(key)
                    .or_insert_with(|| Value::Set(BTreeSet::new()));
                match entry {
                    Value::Set(set) => Reply::Integer(i64::from(set.insert(member))),
                    Value::Hash(_) => Reply::Integer(0),
                }
            }
            Command::SetRemove { key, member } => {
                let removed = match self.keys.get_mut(&key) {
                    Some(Value::Set(set)) => set.remove(&member),
                    _ => false,
                };
                if matches!(self.keys.get(&key), Some(Value::Set(set)) if set.is_empty()) {
                    self.keys.remove(&key);
                }
                Reply::Integer(i64::from(removed))
            }
            Command::HashSet { key, fields } => {
                let entry = self
                    .keys
                    .entry(key)
                    .or_insert_with(|| Value::Hash(BTreeMap::new()));
                let mut created = 0;
                if let Value::Hash(hash) = entry {
                    for (field, value) in fields {
                        if hash.insert(field, value).is_none() {
                            created += 1;
                        }
                    }
                }
                Reply::Integer(created)
            }
            Command::Delete { key } => Reply::Integer(i64::from(self.keys.remove(&key).is_some())),
            Command::Publish { channel, payload } => {
                let mut delivered = 0;
                if let Some(subs) = self.subscribers.get_mut(&channel) {
                    let message = Message {
                        channel: channel.clone(),
                        payload,
                    };
                    subs.retain(|tx| tx.send(message.clone()).is_ok());
                    delivered = subs.len() as i64;
                    if subs.is_empty() {
                        self.subscribers.remove(&channel);
                    }
                }
                Reply::Integer(delivered)
            }
        }
    }
}

#[async_trait]
impl Backplane for MemoryBackplane {
    async fn execute(&self, command: Command) -> BackplaneResult<Reply> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        state.check(&command)?;
        Ok(state.apply(command))
    }

    async fn execute_atomic(&self, transaction: Transaction) -> BackplaneResult<Reply> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        // Validate everything first so a conflict leaves no partial writes.
        for command in transaction.commands() {
            state.check(command)?;
        }
        let replies = transaction
            .into_commands()
            .into_iter()
            .map(|command| state.apply(command))
            .collect();
        Ok(Reply::Multi(replies))
    }

    async fn subscribe(&self, channel: &str) -> BackplaneResult<Subscription> {
        self.ensure_online()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(channel, rx))
    }

    async fn hash_fields(&self, key: &str) -> BackplaneResult<BTreeMap<String, String>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        match state.keys.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(Value::Set(_)) => Err(BackplaneError::WrongType(key.to_string())),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn set_members(&self, key: &str) -> BackplaneResult<BTreeSet<String>> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        match state.keys.get(key) {
            Some(Value::Set(set)) => Ok(set.clone()),
            Some(Value::Hash(_)) => Err(BackplaneError::WrongType(key.to_string())),
            None => Ok(BTreeSet::new()),
        }
    }
}
