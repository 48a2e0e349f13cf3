//! Read-side access to the backplane mirror.
//!
//! Other processes discover entities through the per-type registry set and
//! read their attributes from the mirror hash. Both are plain reads; they do
//! not subscribe to anything.

use crate::error::EntityResult;
use streamsync_backplane::Backplane;
use streamsync_types::{AttributeStore, AttributeValue, EntityId, EntityKey, EntitySchema};
use tracing::warn;

/// Ids currently registered under `type_name`.
///
/// Members that are not valid entity ids are skipped.
pub async fn registered_ids(backplane: &dyn Backplane, type_name: &str) -> EntityResult<Vec<EntityId>> {
    let members = backplane.set_members(type_name).await?;
    let ids = members
        .into_iter()
        .filter_map(|member| match EntityId::parse(&member) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(registry = type_name, "skipping registry member: {}", e);
                None
            }
        })
        .collect();
    Ok(ids)
}

/// Reads an entity's mirrored attributes.
///
/// Declared attributes are parsed with their schema type; fields the schema
/// does not declare are kept as strings. Returns `None` when no mirror hash
/// exists.
pub async fn read_mirror(
    backplane: &dyn Backplane,
    schema: &EntitySchema,
    id: &EntityId,
) -> EntityResult<Option<AttributeStore>> {
    let key = EntityKey::new(schema.type_name.clone(), id.clone());
    let fields = backplane.hash_fields(&key.mirror_key()).await?;
    if fields.is_empty() {
        return Ok(None);
    }
    let mut store = AttributeStore::new();
    for (name, wire) in fields {
        let value = match schema.get(&name) {
            Some(def) => AttributeValue::parse(def.ty(), &wire)?,
            None => AttributeValue::String(wire),
        };
        store.set(name, value);
    }
    Ok(Some(store))
}
