//! Tests against a live Redis server.
//!
//! Set `STREAMSYNC_REDIS_URL` (e.g. `redis://127.0.0.1:6379/15`) to run
//! them; without it they return early. Keys are prefixed per test run so
//! concurrent runs do not collide.

use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use streamsync_backplane::{
    Backplane, BackplaneError, Command, Connection, RedisBackplane, Reply, Transaction,
};
use tokio::time::timeout;

const URL_VAR: &str = "STREAMSYNC_REDIS_URL";

async fn connect() -> Option<RedisBackplane> {
    let url = std::env::var(URL_VAR).ok()?;
    Some(RedisBackplane::connect(&url).await.unwrap())
}

fn unique(name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("streamsync-test:{}:{}:{}", std::process::id(), nanos, name)
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let err = RedisBackplane::connect("redis://127.0.0.1:1/").await.unwrap_err();
    assert!(matches!(err, BackplaneError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn malformed_url_is_unavailable() {
    let err = RedisBackplane::connect("not a url").await.unwrap_err();
    assert!(matches!(err, BackplaneError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn set_and_hash_commands() {
    let Some(bp) = connect().await else { return };
    let set = unique("set");
    let hash = unique("hash");

    assert_eq!(bp.execute(Command::set_add(&set, "a")).await.unwrap(), Reply::Integer(1));
    assert_eq!(bp.execute(Command::set_add(&set, "a")).await.unwrap(), Reply::Integer(0));
    assert_eq!(bp.set_members(&set).await.unwrap(), BTreeSet::from(["a".to_string()]));

    let fields = vec![("x".to_string(), "1".to_string()), ("y".to_string(), "2".to_string())];
    assert_eq!(
        bp.execute(Command::hash_set_all(&hash, fields)).await.unwrap(),
        Reply::Integer(2)
    );
    assert_eq!(
        bp.hash_fields(&hash).await.unwrap(),
        BTreeMap::from([("x".to_string(), "1".to_string()), ("y".to_string(), "2".to_string())])
    );

    assert_eq!(bp.execute(Command::set_remove(&set, "a")).await.unwrap(), Reply::Integer(1));
    assert_eq!(bp.execute(Command::delete(&hash)).await.unwrap(), Reply::Integer(1));
    assert!(bp.set_members(&set).await.unwrap().is_empty());
    assert!(bp.hash_fields(&hash).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_kind_of_key_is_reported() {
    let Some(bp) = connect().await else { return };
    let key = unique("hash");
    bp.execute(Command::hash_set(&key, "f", "v")).await.unwrap();

    let err = bp.execute(Command::set_add(&key, "m")).await.unwrap_err();
    assert_eq!(err, BackplaneError::WrongType(key.clone()));
    bp.execute(Command::delete(&key)).await.unwrap();
}

#[tokio::test]
async fn transaction_replies_per_command() {
    let Some(bp) = connect().await else { return };
    let registry = unique("registry");
    let hash = unique("entity");

    let transaction = Transaction::new()
        .push(Command::set_add(&registry, "c_stream"))
        .push(Command::hash_set(&hash, "frameRate", "10"))
        .push(Command::publish(unique("feed"), b"{}".to_vec()));
    let reply = bp.execute_atomic(transaction).await.unwrap();
    assert_eq!(
        reply,
        Reply::Multi(vec![Reply::Integer(1), Reply::Integer(1), Reply::Integer(0)])
    );
    assert_eq!(
        bp.execute_atomic(Transaction::new()).await.unwrap(),
        Reply::Multi(Vec::new())
    );

    bp.execute(Command::delete(&registry)).await.unwrap();
    bp.execute(Command::delete(&hash)).await.unwrap();
}

#[tokio::test]
async fn subscription_receives_publishes_from_other_client() {
    let Some(subscriber) = connect().await else { return };
    let publisher = connect().await.unwrap();
    let channel = unique("feed");

    let mut sub = subscriber.subscribe(&channel).await.unwrap();
    assert_eq!(sub.channel(), channel);

    let conn = Connection::open(std::sync::Arc::new(publisher));
    let reached = conn
        .submit(Command::publish(&channel, b"hello".to_vec()))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(reached, Reply::Integer(1));

    let message = timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.channel, channel);
    assert_eq!(message.payload, b"hello".to_vec());
}

#[tokio::test]
async fn dropped_subscription_stops_receiving() {
    let Some(bp) = connect().await else { return };
    let channel = unique("feed");

    let sub = bp.subscribe(&channel).await.unwrap();
    drop(sub);

    // The forwarding task notices the drop and closes its connection.
    let gone = async {
        loop {
            let reply = bp
                .execute(Command::publish(&channel, b"x".to_vec()))
                .await
                .unwrap();
            if reply == Reply::Integer(0) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    timeout(Duration::from_secs(5), gone).await.unwrap();
}
