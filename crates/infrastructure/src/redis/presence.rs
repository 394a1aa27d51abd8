//! Redis 在线状态存储
//!
//! `connected_users` hash：字段为用户ID，值为 JSON 记录。
//! 读取时清理超过有效期或无法解析的记录。

use std::collections::HashMap;

use application::{PresenceRecord, PresenceStore, StoreError};
use async_trait::async_trait;
use chrono::Duration;
use domain::{Timestamp, UserId};
use redis::AsyncCommands;
use tracing::{info, warn};

use super::{KeyPrefix, RedisError, RedisResult};

const CONNECTED_USERS_KEY: &str = "connected_users";

pub struct RedisPresenceStore {
    client: redis::Client,
    key: String,
    ttl: Duration,
}

impl RedisPresenceStore {
    pub fn new(client: redis::Client, prefix: &KeyPrefix, ttl: Duration) -> Self {
        Self {
            client,
            key: prefix.apply(CONNECTED_USERS_KEY),
            ttl,
        }
    }

    /// 获取连接
    async fn connection(&self) -> RedisResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::ConnectionError {
                message: format!("Redis connection failed: {e}"),
            })
    }

    async fn purge_and_collect(&self, now: Timestamp) -> RedisResult<Vec<PresenceRecord>> {
        let mut conn = self.connection().await?;
        let entries: HashMap<String, String> = conn.hgetall(&self.key).await?;

        let cutoff = now - self.ttl;
        let mut active = Vec::with_capacity(entries.len());
        let mut expired = Vec::new();

        for (field, value) in entries {
            match serde_json::from_str::<PresenceRecord>(&value) {
                Ok(record) if record.last_seen >= cutoff => active.push(record),
                Ok(_) => expired.push(field),
                Err(err) => {
                    warn!(key = %self.key, field = %field, error = %err, "Dropping unreadable presence record");
                    expired.push(field);
                }
            }
        }

        if !expired.is_empty() {
            let _: () = conn.hdel(&self.key, &expired).await?;
            info!(key = %self.key, purged = expired.len(), "Purged stale presence records");
        }

        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn save(&self, record: &PresenceRecord) -> Result<(), StoreError> {
        let payload = serde_json::to_string(record).map_err(RedisError::from)?;
        let mut conn = self.connection().await?;
        let _: () = conn
            .hset(&self.key, record.id.as_str(), payload)
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }

    async fn remove(&self, user_id: &UserId) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .hdel(&self.key, user_id.as_str())
            .await
            .map_err(RedisError::from)?;
        Ok(())
    }

    async fn load_active(&self, now: Timestamp) -> Result<Vec<PresenceRecord>, StoreError> {
        self.purge_and_collect(now).await.map_err(|err| {
            warn!(key = %self.key, error = %err, "Failed to load presence records");
            StoreError::from(err)
        })
    }
}
