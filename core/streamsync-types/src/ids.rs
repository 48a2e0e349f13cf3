//! Identifier types and the backplane naming convention.
//!
//! Every synced entity is addressed by its type name and an id that is
//! unique within that type. All backplane keys and channels derive from
//! that pair:
//!
//! | Resource         | Name                    |
//! |------------------|-------------------------|
//! | type registry    | `<type>`                |
//! | attribute mirror | `<type>:<id>`           |
//! | feed channel     | `<type>:<id>:feed`      |
//! | data channel     | `<type>:<id>:pipe`      |

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the segments of a backplane key.
const SEPARATOR: char = ':';

/// Identifier of an entity, unique within its type's registry.
///
/// Ids are free-form strings, but they may not be empty, contain
/// whitespace, or contain the key separator `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parses an entity id, rejecting names that would break key derivation.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s.contains(SEPARATOR) || s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Fully qualified address of an entity on the backplane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    type_name: String,
    id: EntityId,
}

impl EntityKey {
    /// Creates a key for `id` within `type_name`.
    pub fn new(type_name: impl Into<String>, id: EntityId) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }

    /// The entity's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The entity's id.
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Set holding the ids of every entity of this type.
    pub fn registry_key(&self) -> String {
        self.type_name.clone()
    }

    /// Hash mirroring the entity's attributes.
    pub fn mirror_key(&self) -> String {
        format!("{}{SEPARATOR}{}", self.type_name, self.id)
    }

    /// Channel carrying JSON control envelopes.
    pub fn feed_channel(&self) -> String {
        format!("{}{SEPARATOR}feed", self.mirror_key())
    }

    /// Channel carrying raw binary frames.
    pub fn data_channel(&self) -> String {
        format!("{}{SEPARATOR}pipe", self.mirror_key())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.type_name, self.id)
    }
}
