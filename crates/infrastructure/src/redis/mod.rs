//! Redis 存储
//!
//! 历史消息用 list（最新在前，LTRIM 截断），在线状态用 hash。

pub mod error;
pub mod history;
pub mod presence;

pub use error::*;
pub use history::RedisHistoryStore;
pub use presence::RedisPresenceStore;

/// 键名前缀。多个部署共用一个 Redis 时用来隔离。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPrefix(Option<String>);

impl KeyPrefix {
    pub fn new(prefix: Option<String>) -> Self {
        Self(prefix.filter(|p| !p.is_empty()))
    }

    pub fn apply(&self, key: &str) -> String {
        match &self.0 {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}
