//! 在线状态
//!
//! [`PresenceRegistry`] 是进程内的实时表：每个用户最多一个当前连接，
//! 重复登录时后来者覆盖先前的连接。
//!
//! [`PresenceStore`] 是可选的持久化视图，供轮询部署或多实例部署查询
//! 最近活跃的用户，超过有效期的记录在读取时被清理。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{Identity, OnlineUser, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::StoreError;

/// 在线表中的一项
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub identity: Identity,
    pub connection: ConnectionHandle,
    pub connected_at: Timestamp,
}

impl PresenceEntry {
    pub fn online_user(&self) -> OnlineUser {
        OnlineUser::from_identity(&self.identity, self.connected_at)
    }
}

/// 进程内在线用户表
#[derive(Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<UserId, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册用户的当前连接，返回被覆盖的旧连接
    pub async fn register(
        &self,
        identity: Identity,
        connection: ConnectionHandle,
        connected_at: Timestamp,
    ) -> Option<PresenceEntry> {
        let mut entries = self.entries.write().await;
        entries.insert(
            identity.id.clone(),
            PresenceEntry {
                identity,
                connection,
                connected_at,
            },
        )
    }

    /// 仅当登记的仍是该连接时才移除。已被新连接覆盖的旧连接断开时不影响新连接。
    pub async fn unregister_connection(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Option<PresenceEntry> {
        let mut entries = self.entries.write().await;
        match entries.get(user_id) {
            Some(entry) if entry.connection.id() == connection_id => entries.remove(user_id),
            _ => None,
        }
    }

    pub async fn lookup(&self, user_id: &UserId) -> Option<PresenceEntry> {
        self.entries.read().await.get(user_id).cloned()
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.entries.read().await.contains_key(user_id)
    }

    /// 当前在线用户快照
    pub async fn snapshot(&self) -> Vec<OnlineUser> {
        let entries = self.entries.read().await;
        let mut users: Vec<OnlineUser> = entries.values().map(PresenceEntry::online_user).collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    /// 除指定用户外所有在线连接
    pub async fn connections_except(&self, user_id: &UserId) -> Vec<ConnectionHandle> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(id, _)| *id != user_id)
            .map(|(_, entry)| entry.connection.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// 持久化的在线记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_online: bool,
    pub last_seen: Timestamp,
}

impl PresenceRecord {
    pub fn online(identity: &Identity, now: Timestamp) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            is_online: true,
            last_seen: now,
        }
    }
}

impl From<PresenceRecord> for OnlineUser {
    fn from(record: PresenceRecord) -> Self {
        OnlineUser {
            id: record.id,
            username: record.username,
            email: record.email,
            is_online: record.is_online,
            last_seen: record.last_seen,
        }
    }
}

/// 在线状态持久化
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// 写入或覆盖用户的在线记录
    async fn save(&self, record: &PresenceRecord) -> Result<(), StoreError>;

    /// 删除用户的在线记录
    async fn remove(&self, user_id: &UserId) -> Result<(), StoreError>;

    /// 读取有效期内的记录，并清理过期记录
    async fn load_active(&self, now: Timestamp) -> Result<Vec<PresenceRecord>, StoreError>;
}

pub mod memory {
    use chrono::Duration;

    use super::*;

    /// 进程内在线记录存储
    pub struct MemoryPresenceStore {
        ttl: Duration,
        records: RwLock<HashMap<UserId, PresenceRecord>>,
    }

    impl MemoryPresenceStore {
        pub fn new(ttl: Duration) -> Self {
            Self {
                ttl,
                records: RwLock::new(HashMap::new()),
            }
        }
    }

    impl Default for MemoryPresenceStore {
        fn default() -> Self {
            Self::new(Duration::hours(24))
        }
    }

    #[async_trait]
    impl PresenceStore for MemoryPresenceStore {
        async fn save(&self, record: &PresenceRecord) -> Result<(), StoreError> {
            self.records
                .write()
                .await
                .insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn remove(&self, user_id: &UserId) -> Result<(), StoreError> {
            self.records.write().await.remove(user_id);
            Ok(())
        }

        async fn load_active(&self, now: Timestamp) -> Result<Vec<PresenceRecord>, StoreError> {
            let cutoff = now - self.ttl;
            let mut records = self.records.write().await;
            records.retain(|_, record| record.last_seen >= cutoff);

            let mut active: Vec<PresenceRecord> = records.values().cloned().collect();
            active.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(active)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryPresenceStore;
    use super::*;
    use chrono::{Duration, Utc};

    fn identity(id: &str) -> Identity {
        Identity::new(UserId::parse(id).unwrap(), id, format!("{id}@example.com"))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = PresenceRegistry::new();
        let (handle, _rx) = ConnectionHandle::channel(8);

        assert!(registry
            .register(identity("alice"), handle.clone(), Utc::now())
            .await
            .is_none());

        let entry = registry.lookup(&UserId::parse("alice").unwrap()).await.unwrap();
        assert_eq!(entry.connection.id(), handle.id());
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_previous_connection() {
        let registry = PresenceRegistry::new();
        let (first, _rx1) = ConnectionHandle::channel(8);
        let (second, _rx2) = ConnectionHandle::channel(8);
        let alice = UserId::parse("alice").unwrap();

        registry.register(identity("alice"), first.clone(), Utc::now()).await;
        let replaced = registry
            .register(identity("alice"), second.clone(), Utc::now())
            .await
            .unwrap();
        assert_eq!(replaced.connection.id(), first.id());
        assert_eq!(registry.len().await, 1);

        // 旧连接断开不能把新连接踢下线
        assert!(registry.unregister_connection(&alice, first.id()).await.is_none());
        assert!(registry.is_online(&alice).await);

        assert!(registry.unregister_connection(&alice, second.id()).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_connections_except() {
        let registry = PresenceRegistry::new();
        let (a, _rx1) = ConnectionHandle::channel(8);
        let (b, _rx2) = ConnectionHandle::channel(8);
        registry.register(identity("alice"), a, Utc::now()).await;
        registry.register(identity("bob"), b.clone(), Utc::now()).await;

        let others = registry
            .connections_except(&UserId::parse("alice").unwrap())
            .await;
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id(), b.id());
    }

    #[tokio::test]
    async fn test_snapshot_wire_format() {
        let registry = PresenceRegistry::new();
        let (handle, _rx) = ConnectionHandle::channel(8);
        registry.register(identity("alice"), handle, Utc::now()).await;

        let json = serde_json::to_value(registry.snapshot().await).unwrap();
        assert_eq!(json[0]["id"], "alice");
        assert_eq!(json[0]["isOnline"], true);
    }

    #[tokio::test]
    async fn test_store_purges_expired_records() {
        let store = MemoryPresenceStore::new(Duration::hours(24));
        let now = Utc::now();

        store
            .save(&PresenceRecord::online(&identity("fresh"), now - Duration::hours(1)))
            .await
            .unwrap();
        store
            .save(&PresenceRecord::online(&identity("stale"), now - Duration::hours(25)))
            .await
            .unwrap();

        let active = store.load_active(now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id.as_str(), "fresh");

        // 过期记录已被清理，时间回拨也不会再出现
        let again = store.load_active(now - Duration::hours(2)).await.unwrap();
        assert!(again.iter().all(|r| r.id.as_str() != "stale"));
    }

    #[tokio::test]
    async fn test_store_remove() {
        let store = MemoryPresenceStore::default();
        let now = Utc::now();
        store
            .save(&PresenceRecord::online(&identity("alice"), now))
            .await
            .unwrap();
        store.remove(&UserId::parse("alice").unwrap()).await.unwrap();
        assert!(store.load_active(now).await.unwrap().is_empty());
    }
}
