//! 并发数据一致性测试
//!
//! 验证高并发下在线表、房间成员关系和历史记录的一致性

use std::collections::HashSet;
use std::sync::Arc;

use application::{
    ConnectionHandle, HistoryStore, MemoryHistoryStore, MessageRouter, MessageRouterDependencies,
    PresenceRegistry, RoomMembership, RouterSettings, SendMessageRequest, Session, SystemClock,
};
use chrono::Utc;
use domain::{ConversationKey, Identity, Message, MessageContent, MessageId, RoomId, UserId};
use futures::future::join_all;

fn identity(id: &str) -> Identity {
    Identity::new(UserId::parse(id).unwrap(), id, format!("{id}@example.com"))
}

/// 测试消息ID在并发生成时不重复
#[tokio::test]
async fn test_concurrent_message_ids_are_unique() {
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            tokio::spawn(async {
                (0..1_000)
                    .map(|_| MessageId::generate())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for result in join_all(tasks).await {
        for id in result.unwrap() {
            assert!(seen.insert(id), "duplicate message id {id}");
        }
    }
    assert_eq!(seen.len(), 16_000);
}

/// 测试并发追加时，读取顺序与追加完成顺序一致且不丢消息
#[tokio::test]
async fn test_concurrent_appends_are_totally_ordered() {
    let store = Arc::new(MemoryHistoryStore::new(100));
    let key = ConversationKey::room(&RoomId::general());
    let sender = identity("writer");

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let store = store.clone();
            let key = key.clone();
            let message = Message::public(
                MessageId::generate(),
                &sender,
                MessageContent::new(format!("m{i}")).unwrap(),
                RoomId::general(),
                Utc::now(),
            );
            tokio::spawn(async move { store.append(&key, &message).await })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let first = store.read(&key, 100).await.unwrap();
    let second = store.read(&key, 100).await.unwrap();
    assert_eq!(first.len(), 50);
    assert_eq!(first, second);

    let unique: HashSet<_> = first.iter().map(|m| m.id).collect();
    assert_eq!(unique.len(), 50);
}

/// 测试并发注册/注销不同用户互不干扰
#[tokio::test]
async fn test_concurrent_register_unregister() {
    let registry = Arc::new(PresenceRegistry::new());
    let ids: Vec<String> = (0..100).map(|i| format!("user{i}")).collect();

    let register_tasks: Vec<_> = ids
        .iter()
        .map(|id| {
            let registry = registry.clone();
            let identity = identity(id);
            tokio::spawn(async move {
                let (connection, _rx) = ConnectionHandle::channel(1);
                let connection_id = connection.id();
                let replaced = registry.register(identity, connection, Utc::now()).await;
                (connection_id, replaced)
            })
        })
        .collect();
    let mut connection_ids = Vec::with_capacity(ids.len());
    for result in join_all(register_tasks).await {
        let (connection_id, replaced) = result.unwrap();
        assert!(replaced.is_none());
        connection_ids.push(connection_id);
    }
    assert_eq!(registry.len().await, 100);

    // 注销偶数用户
    let unregister_tasks: Vec<_> = ids
        .iter()
        .zip(connection_ids)
        .step_by(2)
        .map(|(id, connection_id)| {
            let registry = registry.clone();
            let user_id = UserId::parse(id.as_str()).unwrap();
            tokio::spawn(async move { registry.unregister_connection(&user_id, connection_id).await })
        })
        .collect();
    for result in join_all(unregister_tasks).await {
        assert!(result.unwrap().is_some());
    }

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 50);
    let unique: HashSet<_> = snapshot.iter().map(|u| u.id.clone()).collect();
    assert_eq!(unique.len(), 50);
    assert!(snapshot
        .iter()
        .all(|u| u.id.as_str().trim_start_matches("user").parse::<u32>().unwrap() % 2 == 1));
}

/// 测试多个会话并发发往同一房间：历史完整，每个成员都收到全部消息
#[tokio::test]
async fn test_concurrent_senders_same_room() {
    let history = Arc::new(MemoryHistoryStore::default());
    let presence = Arc::new(PresenceRegistry::new());
    let rooms = Arc::new(RoomMembership::new());
    let router = Arc::new(MessageRouter::new(
        MessageRouterDependencies {
            history: history.clone(),
            presence: presence.clone(),
            rooms: rooms.clone(),
            clock: Arc::new(SystemClock),
        },
        RouterSettings::default(),
    ));

    let mut sessions = Vec::new();
    let mut receivers = Vec::new();
    for i in 0..5 {
        let (connection, rx) = ConnectionHandle::channel(256);
        let identity = identity(&format!("user{i}"));
        presence
            .register(identity.clone(), connection.clone(), Utc::now())
            .await;
        let session = Arc::new(Session::new(
            identity,
            connection,
            Utc::now(),
            RoomId::general(),
        ));
        router
            .join_room(&session, "general")
            .await
            .unwrap();
        sessions.push(session);
        receivers.push(rx);
    }
    // 丢弃加入房间时的历史重放
    for rx in receivers.iter_mut() {
        while rx.try_recv().is_ok() {}
    }

    let tasks: Vec<_> = sessions
        .iter()
        .flat_map(|session| {
            let router = router.clone();
            (0..10).map(move |n| {
                let router = router.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    router
                        .send_message(
                            &session,
                            SendMessageRequest {
                                content: format!("{} #{n}", session.user_id()),
                                ..Default::default()
                            },
                        )
                        .await
                })
            })
        })
        .collect();
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let key = ConversationKey::room(&RoomId::general());
    assert_eq!(history.read(&key, 100).await.unwrap().len(), 50);

    for mut rx in receivers {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 50);
    }
}
