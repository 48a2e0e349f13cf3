use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use streamsync_entity::{EntityError, EventCodec, Method};

#[test]
fn encode_uses_wire_member_names() {
    let codec = EventCodec::new("c_stream");
    let mut data = Map::new();
    data.insert("frameRate".into(), json!(10));
    let raw = codec.encode(Method::Update, data).unwrap();

    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value,
        json!({"clientID": "c_stream", "method": "update", "data": {"frameRate": 10}})
    );
}

#[test]
fn decode_accepts_missing_data_and_unknown_methods() {
    let envelope = EventCodec::decode(br#"{"clientID":"ctl","method":"ping"}"#).unwrap();
    assert_eq!(envelope.method, Method::Other("ping".into()));
    assert_eq!(envelope.data, None);
    assert_eq!(envelope.data_object(), None);
}

#[test]
fn decode_tolerates_extra_members() {
    let envelope =
        EventCodec::decode(br#"{"clientID":"ctl","method":"delete","data":{},"seq":4}"#).unwrap();
    assert_eq!(envelope.method, Method::Delete);
    assert!(envelope.data_object().unwrap().is_empty());
}

#[test]
fn decode_rejects_malformed_envelopes() {
    let payloads: [&[u8]; 5] = [
        b"{",
        b"42",
        br#"{"method":"update"}"#,
        br#"{"clientID":"ctl"}"#,
        br#"{"clientID":null,"method":"update"}"#,
    ];
    for raw in payloads {
        assert!(matches!(EventCodec::decode(raw), Err(EntityError::Protocol(_))));
    }
}

#[test]
fn own_envelopes_are_recognized() {
    let codec = EventCodec::new("c_stream");
    let own = EventCodec::decode(codec.encode(Method::Create, Map::new()).unwrap().as_bytes())
        .unwrap();
    assert!(codec.is_own(&own));

    let other = EventCodec::decode(br#"{"clientID":"c_streamer","method":"update"}"#).unwrap();
    assert!(!codec.is_own(&other));
}

#[test]
fn method_names() {
    assert_eq!(Method::from("create".to_string()), Method::Create);
    assert_eq!(Method::from("Update".to_string()), Method::Other("Update".into()));
    assert_eq!(String::from(Method::Delete), "delete");
    assert_eq!(Method::Other("x".into()).to_string(), "x");
}

proptest! {
    #[test]
    fn decode_recovers_client_and_data(
        client in "[a-z_]{1,12}",
        field in "[a-zA-Z]{1,10}",
        n in any::<i64>(),
    ) {
        let codec = EventCodec::new(client.clone());
        let mut data = Map::new();
        data.insert(field, json!(n));
        let raw = codec.encode(Method::Update, data.clone()).unwrap();

        let envelope = EventCodec::decode(raw.as_bytes()).unwrap();
        prop_assert_eq!(envelope.client_id, client);
        prop_assert_eq!(envelope.method, Method::Update);
        prop_assert_eq!(envelope.data, Some(Value::Object(data)));
    }
}
