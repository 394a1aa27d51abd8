//! Redis 存储集成测试
//!
//! 需要本地 Redis：`REDIS_URL` 默认 redis://127.0.0.1:6379。
//! 运行方式：cargo test -p infrastructure -- --ignored

use application::{HistoryStore, PresenceRecord, PresenceStore};
use chrono::{Duration, Utc};
use domain::{ConversationKey, Identity, Message, MessageContent, MessageId, RoomId, UserId};
use infrastructure::{KeyPrefix, RedisHistoryStore, RedisPresenceStore};
use uuid::Uuid;

fn client() -> anyhow::Result<redis::Client> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    Ok(redis::Client::open(url)?)
}

/// 使用随机前缀避免测试冲突
fn test_prefix() -> KeyPrefix {
    KeyPrefix::new(Some(format!("test-{}", Uuid::new_v4())))
}

fn identity(id: &str) -> Identity {
    Identity::new(UserId::parse(id).unwrap(), id, format!("{id}@example.com"))
}

fn message(sender: &Identity, content: &str, room: &RoomId) -> Message {
    Message::public(
        MessageId::generate(),
        sender,
        MessageContent::new(content).unwrap(),
        room.clone(),
        Utc::now(),
    )
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_history_trims_and_reads_oldest_first() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = RedisHistoryStore::new(client()?, test_prefix(), 100);
    let room = RoomId::general();
    let key = ConversationKey::room(&room);
    let alice = identity("alice");

    let mut sent = Vec::new();
    for i in 1..=101 {
        let m = message(&alice, &format!("#{i}"), &room);
        store.append(&key, &m).await?;
        sent.push(m);
    }

    let all = store.read(&key, 1000).await?;
    assert_eq!(all.len(), 100);
    assert_eq!(all, sent[1..].to_vec());

    let recent = store.read(&key, 50).await?;
    assert_eq!(recent, sent[51..].to_vec());

    let missing = ConversationKey::room(&RoomId::parse("nobody-here")?);
    assert!(store.read(&missing, 50).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_private_history_shared_by_both_users() -> anyhow::Result<()> {
    let store = RedisHistoryStore::new(client()?, test_prefix(), 100);
    let alice = identity("alice");
    let bob = identity("bob");

    let m = Message::private(
        MessageId::generate(),
        &bob,
        MessageContent::new("hi")?,
        alice.id.clone(),
        Utc::now(),
    );
    store.append(&m.conversation_key(), &m).await?;

    let from_alice = store
        .read(&ConversationKey::private(&alice.id, &bob.id), 50)
        .await?;
    let from_bob = store
        .read(&ConversationKey::private(&bob.id, &alice.id), 50)
        .await?;
    assert_eq!(from_alice, vec![m.clone()]);
    assert_eq!(from_bob, vec![m]);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_presence_purges_expired_entries() -> anyhow::Result<()> {
    let store = RedisPresenceStore::new(client()?, &test_prefix(), Duration::hours(24));
    let now = Utc::now();

    store
        .save(&PresenceRecord::online(&identity("fresh"), now))
        .await?;
    store
        .save(&PresenceRecord::online(
            &identity("stale"),
            now - Duration::hours(30),
        ))
        .await?;
    store
        .save(&PresenceRecord::online(&identity("gone"), now))
        .await?;
    store.remove(&UserId::parse("gone")?).await?;

    let active = store.load_active(now).await?;
    let ids: Vec<&str> = active.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh"]);

    // 过期记录已从 hash 中删除
    let later = store.load_active(now - Duration::hours(10)).await?;
    assert!(later.iter().all(|r| r.id.as_str() != "stale"));
    Ok(())
}
