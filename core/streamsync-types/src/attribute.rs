//! Typed attribute values and the per-entity attribute store.
//!
//! Attributes travel in two forms: the *wire string* written into the
//! backplane's attribute hash, and a JSON value carried inside feed
//! envelopes. Both conversions are lossless for every [`AttributeType`].

use crate::{EntityId, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    /// Reference to another entity, stored by id.
    EntityRef,
    /// Reference to a stream entity, stored by id.
    StreamRef,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::EntityRef => "entity reference",
            Self::StreamRef => "stream reference",
        };
        f.write_str(name)
    }
}

/// A typed attribute value.
///
/// Reference variants hold the foreign entity's identity only; they never
/// own or keep the referenced entity alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    EntityRef(EntityId),
    StreamRef(EntityId),
}

impl AttributeValue {
    /// Returns the type of this value.
    #[must_use]
    pub fn ty(&self) -> AttributeType {
        match self {
            Self::String(_) => AttributeType::String,
            Self::Integer(_) => AttributeType::Integer,
            Self::EntityRef(_) => AttributeType::EntityRef,
            Self::StreamRef(_) => AttributeType::StreamRef,
        }
    }

    /// Serializes the value to its wire string.
    ///
    /// Strings are written verbatim, integers in decimal, and references as
    /// the referenced entity's id.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::EntityRef(id) | Self::StreamRef(id) => id.to_string(),
        }
    }

    /// Parses a wire string as a value of type `ty`.
    pub fn parse(ty: AttributeType, wire: &str) -> Result<Self> {
        match ty {
            AttributeType::String => Ok(Self::String(wire.to_string())),
            AttributeType::Integer => wire
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|e| Error::Parse {
                    ty,
                    input: wire.to_string(),
                    reason: e.to_string(),
                }),
            AttributeType::EntityRef => Ok(Self::EntityRef(parse_ref(ty, wire)?)),
            AttributeType::StreamRef => Ok(Self::StreamRef(parse_ref(ty, wire)?)),
        }
    }

    /// Converts the value to the JSON form used inside feed envelopes.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(n) => Value::from(*n),
            other => Value::String(other.serialize()),
        }
    }

    /// Reads a value of type `ty` from its JSON envelope form.
    ///
    /// Integers must be JSON integers; every other type must be a JSON string.
    pub fn from_json(ty: AttributeType, json: &Value) -> Result<Self> {
        let mismatch = || Error::Parse {
            ty,
            input: json.to_string(),
            reason: "unexpected JSON type".to_string(),
        };
        match ty {
            AttributeType::Integer => json.as_i64().map(Self::Integer).ok_or_else(mismatch),
            _ => {
                let s = json.as_str().ok_or_else(mismatch)?;
                Self::parse(ty, s)
            }
        }
    }

    /// Returns the integer payload, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_ref(ty: AttributeType, wire: &str) -> Result<EntityId> {
    EntityId::parse(wire).map_err(|e| Error::Parse {
        ty,
        input: wire.to_string(),
        reason: e.to_string(),
    })
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A named attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The attribute's type, as carried by its value.
    #[must_use]
    pub fn ty(&self) -> AttributeType {
        self.value.ty()
    }
}

/// The full observable state of one entity: attribute name to value.
///
/// Names are unique. The store is not synchronized; it belongs to exactly
/// one owner at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeStore {
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an attribute value by name.
    pub fn get(&self, name: &str) -> Result<&AttributeValue> {
        self.attributes
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Looks up an integer attribute.
    pub fn get_integer(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_integer().ok_or_else(|| Error::Parse {
            ty: AttributeType::Integer,
            input: value.serialize(),
            reason: format!("attribute {name} holds a {}", value.ty()),
        })
    }

    /// Sets an attribute, returning the previous value if there was one.
    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        self.attributes.insert(name.into(), value)
    }

    /// Whether an attribute with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the store holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterates over attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Wire-string pairs suitable for writing the attribute hash.
    pub fn to_wire_fields(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.serialize()))
            .collect()
    }

    /// JSON object form, as carried in a `create` envelope.
    pub fn to_json(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

impl FromIterator<Attribute> for AttributeStore {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().map(|a| (a.name, a.value)).collect(),
        }
    }
}
