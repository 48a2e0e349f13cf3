use streamsync_types::{Attribute, AttributeValue, EntityId, EntitySchema};

/// Configuration for creating a synced entity.
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Schema declaring the entity's type name and attributes.
    pub schema: EntitySchema,
    /// Id, unique within the schema's type.
    pub id: EntityId,
    /// Identity stamped into published envelopes and used to drop echoes.
    /// Defaults to the entity id.
    pub client_id: Option<String>,
    /// Initial values overriding the schema defaults.
    pub attributes: Vec<Attribute>,
}

impl EntityConfig {
    /// Configuration for an entity of `schema` with default attributes.
    pub fn new(schema: EntitySchema, id: EntityId) -> Self {
        Self {
            schema,
            id,
            client_id: None,
            attributes: Vec::new(),
        }
    }

    /// Configuration for a stream entity.
    pub fn stream(id: EntityId) -> Self {
        Self::new(EntitySchema::stream(), id)
    }

    /// Overrides the client identity.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets an initial attribute value.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// The effective client identity.
    pub fn effective_client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}
