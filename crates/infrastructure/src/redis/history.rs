//! Redis 历史消息存储
//!
//! 每个会话键一个 list：LPUSH 新消息，LTRIM 保留最近 N 条，LRANGE 后反转成时间升序。

use application::{HistoryStore, StoreError};
use async_trait::async_trait;
use domain::{ConversationKey, Message};
use redis::AsyncCommands;
use tracing::{debug, warn};

use super::{KeyPrefix, RedisError, RedisResult};

pub struct RedisHistoryStore {
    client: redis::Client,
    prefix: KeyPrefix,
    capacity: usize,
}

impl RedisHistoryStore {
    pub fn new(client: redis::Client, prefix: KeyPrefix, capacity: usize) -> Self {
        Self {
            client,
            prefix,
            capacity: capacity.max(1),
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

    async fn push(&self, key: &str, payload: String) -> RedisResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .lpush(key, payload)
            .ignore()
            .ltrim(key, 0, self.capacity as isize - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn range(&self, key: &str, limit: usize) -> RedisResult<Vec<Message>> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = conn.lrange(key, 0, limit as isize - 1).await?;

        let mut messages = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_str::<Message>(&entry) {
                Ok(message) => messages.push(message),
                Err(err) => {
                    return Err(RedisError::DeserializationError {
                        key: key.to_string(),
                        message: err.to_string(),
                    })
                }
            }
        }
        messages.reverse();
        Ok(messages)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(&self, key: &ConversationKey, message: &Message) -> Result<(), StoreError> {
        let redis_key = self.prefix.apply(key.as_str());
        let payload = serde_json::to_string(message).map_err(RedisError::from)?;

        self.push(&redis_key, payload).await.map_err(|err| {
            warn!(key = %redis_key, error = %err, "Failed to append message");
            StoreError::from(err)
        })?;

        debug!(key = %redis_key, message_id = %message.id, "Message appended");
        Ok(())
    }

    async fn read(&self, key: &ConversationKey, limit: usize) -> Result<Vec<Message>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let redis_key = self.prefix.apply(key.as_str());
        self.range(&redis_key, limit).await.map_err(|err| {
            warn!(key = %redis_key, error = %err, "Failed to read history");
            StoreError::from(err)
        })
    }
}
