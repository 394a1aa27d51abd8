//! 历史消息存储
//!
//! 每个会话键对应一个有界日志：最新的消息在最前，超过容量时淘汰最旧的。
//! 读取时返回最近 `limit` 条，按时间升序排列。

use async_trait::async_trait;
use domain::{ConversationKey, Message};

use crate::error::StoreError;

/// 每个会话键保留的默认消息数
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// 重放历史时的默认条数
pub const DEFAULT_REPLAY_LIMIT: usize = 50;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加一条消息。同一个键上的追加按调用完成顺序排列。
    async fn append(&self, key: &ConversationKey, message: &Message) -> Result<(), StoreError>;

    /// 读取最近 `limit` 条消息，按时间升序。键不存在时返回空列表。
    async fn read(&self, key: &ConversationKey, limit: usize) -> Result<Vec<Message>, StoreError>;
}

pub mod memory {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    use tokio::sync::{Mutex, RwLock};

    use super::*;

    type Log = Arc<Mutex<VecDeque<Message>>>;

    /// 进程内历史存储
    pub struct MemoryHistoryStore {
        capacity: usize,
        logs: RwLock<HashMap<ConversationKey, Log>>,
    }

    impl MemoryHistoryStore {
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity: capacity.max(1),
                logs: RwLock::new(HashMap::new()),
            }
        }

        pub fn capacity(&self) -> usize {
            self.capacity
        }

        async fn log(&self, key: &ConversationKey) -> Log {
            if let Some(log) = self.logs.read().await.get(key) {
                return log.clone();
            }
            let mut logs = self.logs.write().await;
            logs.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity))))
                .clone()
        }
    }

    impl Default for MemoryHistoryStore {
        fn default() -> Self {
            Self::new(DEFAULT_HISTORY_CAPACITY)
        }
    }

    #[async_trait]
    impl HistoryStore for MemoryHistoryStore {
        async fn append(&self, key: &ConversationKey, message: &Message) -> Result<(), StoreError> {
            let log = self.log(key).await;
            let mut log = log.lock().await;
            log.push_front(message.clone());
            log.truncate(self.capacity);
            Ok(())
        }

        async fn read(
            &self,
            key: &ConversationKey,
            limit: usize,
        ) -> Result<Vec<Message>, StoreError> {
            let log = match self.logs.read().await.get(key) {
                Some(log) => log.clone(),
                None => return Ok(Vec::new()),
            };
            let log = log.lock().await;
            let mut messages: Vec<Message> = log.iter().take(limit).cloned().collect();
            messages.reverse();
            Ok(messages)
        }
    }
}
