use pretty_assertions::assert_eq;
use streamsync_types::{
    AttributeType, AttributeValue, EntityId, EntityKey, EntitySchema, DIMENSIONS, FRAME_LENGTH,
    FRAME_RATE, STREAM_TYPE,
};

// ── Stream schema ────────────────────────────────────────────────

#[test]
fn stream_schema_declares_integer_defaults() {
    let schema = EntitySchema::stream();
    assert_eq!(schema.type_name, STREAM_TYPE);
    for name in [FRAME_LENGTH, FRAME_RATE, DIMENSIONS] {
        let def = schema.get(name).unwrap();
        assert_eq!(def.ty(), AttributeType::Integer);
        assert_eq!(def.default, AttributeValue::Integer(1));
    }
}

#[test]
fn schema_recognizes_only_declared_names() {
    let schema = EntitySchema::stream();
    assert!(schema.recognizes(FRAME_RATE));
    assert!(!schema.recognizes("bogus"));
}

#[test]
fn with_attribute_extends_and_replaces() {
    let schema = EntitySchema::stream()
        .with_attribute("label", "untitled")
        .with_attribute(FRAME_RATE, 25);
    assert_eq!(schema.attributes.len(), 4);
    assert_eq!(schema.get(FRAME_RATE).unwrap().default, AttributeValue::Integer(25));
    assert_eq!(schema.get("label").unwrap().ty(), AttributeType::String);
}

#[test]
fn defaults_builds_full_store() {
    let store = EntitySchema::stream().defaults();
    assert_eq!(store.len(), 3);
    assert_eq!(store.get_integer(FRAME_LENGTH).unwrap(), 1);
}

#[test]
fn schema_json_round_trip() {
    let schema = EntitySchema::new("sensor").with_attribute("unit", "mV");
    let json = serde_json::to_string(&schema).unwrap();
    let back: EntitySchema = serde_json::from_str(&json).unwrap();
    assert_eq!(back, schema);
}

// ── Ids and keys ─────────────────────────────────────────────────

#[test]
fn entity_id_rejects_separator_whitespace_and_empty() {
    assert!(EntityId::parse("").is_err());
    assert!(EntityId::parse("a:b").is_err());
    assert!(EntityId::parse("a b").is_err());
    assert_eq!(EntityId::parse("c_stream").unwrap().as_str(), "c_stream");
}

#[test]
fn entity_id_deserialization_validates() {
    assert!(serde_json::from_str::<EntityId>("\"ok_id\"").is_ok());
    assert!(serde_json::from_str::<EntityId>("\"bad:id\"").is_err());
}

#[test]
fn key_naming_convention() {
    let key = EntityKey::new("stream", EntityId::parse("c_stream").unwrap());
    assert_eq!(key.registry_key(), "stream");
    assert_eq!(key.mirror_key(), "stream:c_stream");
    assert_eq!(key.feed_channel(), "stream:c_stream:feed");
    assert_eq!(key.data_channel(), "stream:c_stream:pipe");
    assert_eq!(key.to_string(), "stream:c_stream");
}
