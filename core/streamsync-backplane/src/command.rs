//! Backplane commands, replies and atomic transactions.

/// A single backplane command.
///
/// A command owns its payload; it is consumed when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a member to a set (`SADD key member`).
    SetAdd { key: String, member: String },

    /// Remove a member from a set (`SREM key member`).
    SetRemove { key: String, member: String },

    /// Write one or more hash fields (`HSET key field value ...`).
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// Delete a key of any kind (`DEL key`).
    Delete { key: String },

    /// Publish a payload on a channel (`PUBLISH channel payload`).
    Publish { channel: String, payload: Vec<u8> },
}

impl Command {
    pub fn set_add(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetAdd {
            key: key.into(),
            member: member.into(),
        }
    }

    pub fn set_remove(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetRemove {
            key: key.into(),
            member: member.into(),
        }
    }

    /// Writes a single hash field.
    pub fn hash_set(key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::HashSet {
            key: key.into(),
            fields: vec![(field.into(), value.into())],
        }
    }

    /// Writes several hash fields in one command.
    pub fn hash_set_all(key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self::HashSet {
            key: key.into(),
            fields,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    pub fn publish(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::Publish {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Short command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAdd { .. } => "SADD",
            Self::SetRemove { .. } => "SREM",
            Self::HashSet { .. } => "HSET",
            Self::Delete { .. } => "DEL",
            Self::Publish { .. } => "PUBLISH",
        }
    }
}

/// Reply to a command or transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain acknowledgment.
    Ok,
    /// Count reply: members added, fields created, keys deleted, receivers reached.
    Integer(i64),
    /// One reply per command of a committed transaction.
    Multi(Vec<Reply>),
}

impl Reply {
    /// The integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

/// A group of commands applied atomically: other clients observe either
/// none or all of their effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
