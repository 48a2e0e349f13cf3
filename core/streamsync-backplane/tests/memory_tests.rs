use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use streamsync_backplane::{
    Backplane, BackplaneError, Command, MemoryBackplane, Reply, Transaction,
};

// ── Sets ─────────────────────────────────────────────────────────

#[tokio::test]
async fn set_add_is_idempotent() {
    let bp = MemoryBackplane::new();
    let first = bp.execute(Command::set_add("stream", "a")).await.unwrap();
    let second = bp.execute(Command::set_add("stream", "a")).await.unwrap();
    assert_eq!(first, Reply::Integer(1));
    assert_eq!(second, Reply::Integer(0));
    assert_eq!(
        bp.set_members("stream").await.unwrap(),
        BTreeSet::from(["a".to_string()])
    );
}

#[tokio::test]
async fn set_remove_last_member_drops_key() {
    let bp = MemoryBackplane::new();
    bp.execute(Command::set_add("stream", "a")).await.unwrap();
    let reply = bp.execute(Command::set_remove("stream", "a")).await.unwrap();
    assert_eq!(reply, Reply::Integer(1));
    assert!(bp.set_members("stream").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_keys_read_as_empty() {
    let bp = MemoryBackplane::new();
    assert!(bp.set_members("nothing").await.unwrap().is_empty());
    assert!(bp.hash_fields("nothing").await.unwrap().is_empty());
}

// ── Hashes ───────────────────────────────────────────────────────

#[tokio::test]
async fn hash_set_counts_new_fields_only() {
    let bp = MemoryBackplane::new();
    let reply = bp
        .execute(Command::hash_set_all(
            "stream:a",
            vec![("x".into(), "1".into()), ("y".into(), "2".into())],
        ))
        .await
        .unwrap();
    assert_eq!(reply, Reply::Integer(2));

    let reply = bp.execute(Command::hash_set("stream:a", "x", "5")).await.unwrap();
    assert_eq!(reply, Reply::Integer(0));

    let fields = bp.hash_fields("stream:a").await.unwrap();
    assert_eq!(
        fields,
        BTreeMap::from([("x".to_string(), "5".to_string()), ("y".to_string(), "2".to_string())])
    );
}

#[tokio::test]
async fn wrong_type_is_rejected() {
    let bp = MemoryBackplane::new();
    bp.execute(Command::set_add("k", "m")).await.unwrap();
    let err = bp.execute(Command::hash_set("k", "f", "v")).await.unwrap_err();
    assert_eq!(err, BackplaneError::WrongType("k".into()));
    assert!(bp.hash_fields("k").await.is_err());
}

#[tokio::test]
async fn delete_removes_key() {
    let bp = MemoryBackplane::new();
    bp.execute(Command::hash_set("h", "f", "v")).await.unwrap();
    assert_eq!(bp.execute(Command::delete("h")).await.unwrap(), Reply::Integer(1));
    assert_eq!(bp.execute(Command::delete("h")).await.unwrap(), Reply::Integer(0));
}

// ── Publish / subscribe ──────────────────────────────────────────

#[tokio::test]
async fn publish_reaches_every_subscriber() {
    let bp = MemoryBackplane::new();
    let mut a = bp.subscribe("chan").await.unwrap();
    let mut b = bp.clone().subscribe("chan").await.unwrap();

    let reply = bp.execute(Command::publish("chan", b"hi".to_vec())).await.unwrap();
    assert_eq!(reply, Reply::Integer(2));

    assert_eq!(a.recv().await.unwrap().payload, b"hi".to_vec());
    let msg = b.recv().await.unwrap();
    assert_eq!(msg.channel, "chan");
    assert_eq!(msg.payload, b"hi".to_vec());
}

#[tokio::test]
async fn publish_without_subscribers_reaches_nobody() {
    let bp = MemoryBackplane::new();
    let reply = bp.execute(Command::publish("chan", vec![1, 2, 3])).await.unwrap();
    assert_eq!(reply, Reply::Integer(0));
}

#[tokio::test]
async fn other_channels_are_not_delivered() {
    let bp = MemoryBackplane::new();
    let mut feed = bp.subscribe("s:a:feed").await.unwrap();
    bp.execute(Command::publish("s:a:pipe", vec![0u8; 16])).await.unwrap();
    assert!(feed.try_recv().is_none());
}

#[tokio::test]
async fn dropping_subscription_unsubscribes() {
    let bp = MemoryBackplane::new();
    let sub = bp.subscribe("chan").await.unwrap();
    assert_eq!(sub.channel(), "chan");
    assert_eq!(bp.subscriber_count("chan").await, 1);
    drop(sub);
    assert_eq!(bp.subscriber_count("chan").await, 0);
    let reply = bp.execute(Command::publish("chan", vec![1])).await.unwrap();
    assert_eq!(reply, Reply::Integer(0));
}

// ── Transactions ─────────────────────────────────────────────────

#[tokio::test]
async fn transaction_returns_one_reply_per_command() {
    let bp = MemoryBackplane::new();
    let tx = Transaction::new()
        .push(Command::set_add("stream", "a"))
        .push(Command::hash_set("stream:a", "frameRate", "1"))
        .push(Command::publish("stream:a:feed", b"{}".to_vec()));
    assert_eq!(tx.len(), 3);

    let reply = bp.execute_atomic(tx).await.unwrap();
    assert_eq!(
        reply,
        Reply::Multi(vec![Reply::Integer(1), Reply::Integer(1), Reply::Integer(0)])
    );
}

#[tokio::test]
async fn conflicting_transaction_applies_nothing() {
    let bp = MemoryBackplane::new();
    bp.execute(Command::set_add("taken", "x")).await.unwrap();

    let tx = Transaction::new()
        .push(Command::set_add("stream", "a"))
        .push(Command::hash_set("taken", "f", "v"));
    assert!(bp.execute_atomic(tx).await.is_err());
    assert!(bp.set_members("stream").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reader_never_sees_partial_hash() {
    let bp = MemoryBackplane::new();
    let fields: Vec<(String, String)> = (0..32).map(|i| (format!("f{i}"), i.to_string())).collect();

    let reader = {
        let bp = bp.clone();
        tokio::spawn(async move {
            let mut sizes = Vec::new();
            for _ in 0..500 {
                sizes.push(bp.hash_fields("h").await.unwrap().len());
                tokio::task::yield_now().await;
            }
            sizes
        })
    };

    let tx = Transaction::new()
        .push(Command::set_add("reg", "h"))
        .push(Command::hash_set_all("h", fields));
    bp.execute_atomic(tx).await.unwrap();

    for size in reader.await.unwrap() {
        assert!(size == 0 || size == 32, "observed partial hash of {size} fields");
    }
}

// ── Reachability ─────────────────────────────────────────────────

#[tokio::test]
async fn offline_backplane_fails_every_operation() {
    let bp = MemoryBackplane::new();
    bp.set_online(false);
    assert!(!bp.is_online());
    assert!(matches!(
        bp.execute(Command::set_add("s", "a")).await,
        Err(BackplaneError::Unavailable(_))
    ));
    assert!(bp.subscribe("c").await.is_err());
    assert!(bp.set_members("s").await.is_err());

    bp.set_online(true);
    assert!(bp.execute(Command::set_add("s", "a")).await.is_ok());
}
