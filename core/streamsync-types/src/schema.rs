use crate::{Attribute, AttributeStore, AttributeType, AttributeValue};
use serde::{Deserialize, Serialize};

/// Type name of the built-in stream schema.
pub const STREAM_TYPE: &str = "stream";
/// Number of samples in one frame.
pub const FRAME_LENGTH: &str = "frameLength";
/// Frames per second; drives the poll interval.
pub const FRAME_RATE: &str = "frameRate";
/// Number of channels per sample.
pub const DIMENSIONS: &str = "dimensions";

/// Declares an entity type: its name and the attributes it recognizes.
///
/// Only attributes declared here can be updated locally or applied from
/// remote events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub type_name: String,
    pub attributes: Vec<AttributeDef>,
}

/// One declared attribute with its default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub default: AttributeValue,
}

impl AttributeDef {
    /// The declared type, taken from the default value.
    #[must_use]
    pub fn ty(&self) -> AttributeType {
        self.default.ty()
    }
}

impl EntitySchema {
    /// An empty schema for `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
        }
    }

    /// The stream schema: `frameLength`, `frameRate` and `dimensions`, all
    /// integers defaulting to 1.
    pub fn stream() -> Self {
        Self::new(STREAM_TYPE)
            .with_attribute(FRAME_LENGTH, 1)
            .with_attribute(FRAME_RATE, 1)
            .with_attribute(DIMENSIONS, 1)
    }

    /// Declares an attribute, replacing an earlier declaration of the same name.
    pub fn with_attribute(mut self, name: impl Into<String>, default: impl Into<AttributeValue>) -> Self {
        let def = AttributeDef {
            name: name.into(),
            default: default.into(),
        };
        match self.attributes.iter_mut().find(|a| a.name == def.name) {
            Some(existing) => *existing = def,
            None => self.attributes.push(def),
        }
        self
    }

    /// Looks up a declared attribute.
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether `name` is declared.
    pub fn recognizes(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// A store holding every declared attribute at its default.
    pub fn defaults(&self) -> AttributeStore {
        self.attributes
            .iter()
            .map(|def| Attribute::new(def.name.clone(), def.default.clone()))
            .collect()
    }
}
