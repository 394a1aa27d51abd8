//! 基础设施层实现。
//!
//! 提供 Redis 历史消息 / 在线状态存储、JWT 凭证验证等适配器，实现应用/领域层定义的接口。

pub mod auth;
pub mod builder;
pub mod redis;

pub use auth::{Claims, JwtCredentialVerifier};
pub use builder::{Infrastructure, InfrastructureError};
pub use self::redis::{KeyPrefix, RedisError, RedisHistoryStore, RedisPresenceStore};
