//! 统一配置中心
//!
//! 提供聊天核心的全局配置，包括：
//! - 房间与历史记录参数
//! - 投递模式（推送 / 轮询）
//! - 存储后端与 Redis 连接
//! - JWT 凭证校验
//!
//! 加载顺序：内置默认值 -> `CHAT_CONFIG_FILE` 指定的 YAML 文件 -> `CHAT_` 前缀环境变量
//! （嵌套字段用 `__` 分隔，例如 `CHAT_CHAT__HISTORY_CAPACITY=200`）。

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 配置文件路径环境变量
pub const CONFIG_FILE_ENV: &str = "CHAT_CONFIG_FILE";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHAT_";

/// 全局应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 聊天核心配置
    pub chat: ChatConfig,
    /// 存储后端选择
    pub storage: StorageConfig,
    /// Redis配置
    pub redis: RedisConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
}

/// 投递模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// 长连接实时推送
    Push,
    /// 客户端轮询历史记录，服务端只负责持久化
    Poll,
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

/// 聊天核心配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// 连接后自动加入的房间
    pub default_room: String,
    /// 每个会话键保留的最大消息数
    pub history_capacity: usize,
    /// 重放历史时返回的消息数
    pub replay_limit: usize,
    /// 每个连接的出站缓冲区容量
    pub outbound_buffer: usize,
    /// 投递模式
    pub delivery_mode: DeliveryMode,
    /// 在线记录过期时间（小时）
    pub presence_ttl_hours: i64,
}

/// 存储后端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub history: StorageBackend,
    pub presence: StorageBackend,
}

/// Redis配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// 键名前缀，多个部署共用一个 Redis 时使用
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// JWT配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// 校验过期时间的容差（秒）
    pub leeway_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_room: "general".to_string(),
            history_capacity: 100,
            replay_limit: 50,
            outbound_buffer: 256,
            delivery_mode: DeliveryMode::Push,
            presence_ttl_hours: 24,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history: StorageBackend::Memory,
            presence: StorageBackend::Memory,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "dev-secret-key-not-for-production-use-minimum-32-chars".to_string(),
            leeway_seconds: 0,
        }
    }
}

impl Default for AppConfig {
    /// 默认配置使用开发环境版本（内存存储、开发密钥）
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
            redis: RedisConfig::default(),
            jwt: JwtConfig::default(),
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chat = &self.chat;

        if chat.default_room.is_empty()
            || chat
                .default_room
                .chars()
                .any(|c| c == ':' || c.is_whitespace())
        {
            return Err(ConfigError::InvalidChatConfig(format!(
                "invalid default room name: {:?}",
                chat.default_room
            )));
        }

        if chat.history_capacity == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "history capacity must be greater than 0".to_string(),
            ));
        }

        if chat.replay_limit == 0 || chat.replay_limit > chat.history_capacity {
            return Err(ConfigError::InvalidChatConfig(
                "replay limit must be between 1 and history capacity".to_string(),
            ));
        }

        if chat.outbound_buffer == 0 {
            return Err(ConfigError::InvalidChatConfig(
                "outbound buffer must be greater than 0".to_string(),
            ));
        }

        if chat.presence_ttl_hours <= 0 {
            return Err(ConfigError::InvalidChatConfig(
                "presence ttl must be positive".to_string(),
            ));
        }

        // 至少256位密钥
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        let uses_redis = self.storage.history == StorageBackend::Redis
            || self.storage.presence == StorageBackend::Redis;
        if uses_redis && !self.redis.url.starts_with("redis://") && !self.redis.url.starts_with("rediss://") {
            return Err(ConfigError::InvalidRedisConfig(format!(
                "unsupported redis url: {}",
                self.redis.url
            )));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid chat configuration: {0}")]
    InvalidChatConfig(String),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid redis configuration: {0}")]
    InvalidRedisConfig(String),
}
