use std::sync::Arc;

use application::{
    ApplicationError, ChatEngine, ChatEngineDependencies, Clock, HistoryStore,
    MemoryHistoryStore, MemoryPresenceStore, PresenceStore, SystemClock,
};
use chrono::Duration;
use config::{AppConfig, ConfigError, StorageBackend};
use thiserror::Error;
use tracing::info;

use crate::{
    auth::JwtCredentialVerifier,
    redis::{KeyPrefix, RedisHistoryStore, RedisPresenceStore},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("application error: {0}")]
    Application(#[from] ApplicationError),
}

/// 按配置选择的适配器集合
#[derive(Clone)]
pub struct Infrastructure {
    pub history: Arc<dyn HistoryStore>,
    pub presence_store: Arc<dyn PresenceStore>,
    pub verifier: Arc<JwtCredentialVerifier>,
    pub clock: Arc<dyn Clock>,
}

impl Infrastructure {
    /// 根据配置创建存储与凭证验证器。Redis 客户端延迟连接，首次读写时才建立连接。
    pub fn from_config(config: &AppConfig) -> Result<Self, InfrastructureError> {
        config.validate()?;

        let needs_redis = config.storage.history == StorageBackend::Redis
            || config.storage.presence == StorageBackend::Redis;
        let client = if needs_redis {
            Some(redis::Client::open(config.redis.url.as_str())?)
        } else {
            None
        };
        let prefix = KeyPrefix::new(config.redis.key_prefix.clone());
        let ttl = Duration::hours(config.chat.presence_ttl_hours);

        let history: Arc<dyn HistoryStore> = match (&config.storage.history, &client) {
            (StorageBackend::Redis, Some(client)) => Arc::new(RedisHistoryStore::new(
                client.clone(),
                prefix.clone(),
                config.chat.history_capacity,
            )),
            _ => Arc::new(MemoryHistoryStore::new(config.chat.history_capacity)),
        };

        let presence_store: Arc<dyn PresenceStore> = match (&config.storage.presence, &client) {
            (StorageBackend::Redis, Some(client)) => {
                Arc::new(RedisPresenceStore::new(client.clone(), &prefix, ttl))
            }
            _ => Arc::new(MemoryPresenceStore::new(ttl)),
        };

        info!(
            history = ?config.storage.history,
            presence = ?config.storage.presence,
            delivery_mode = ?config.chat.delivery_mode,
            "Infrastructure initialized"
        );

        Ok(Self {
            history,
            presence_store,
            verifier: Arc::new(JwtCredentialVerifier::new(&config.jwt)),
            clock: Arc::new(SystemClock),
        })
    }

    /// 组装聊天核心
    pub fn engine(&self, config: &AppConfig) -> Result<ChatEngine, InfrastructureError> {
        let engine = ChatEngine::new(
            ChatEngineDependencies {
                verifier: self.verifier.clone(),
                history: self.history.clone(),
                presence_store: self.presence_store.clone(),
                clock: self.clock.clone(),
            },
            &config.chat,
        )?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use domain::{Identity, ServerEvent, UserId};

    #[tokio::test]
    async fn test_memory_backends_build_working_engine() {
        let config = AppConfig::default();
        let infrastructure = Infrastructure::from_config(&config).unwrap();
        let engine = infrastructure.engine(&config).unwrap();

        let identity = Identity::new(UserId::parse("alice").unwrap(), "alice", "a@example.com");
        let token = infrastructure
            .verifier
            .issue(&identity, ChronoDuration::hours(1))
            .unwrap();

        let (connection, mut rx) = engine.open_connection();
        let session = engine.connect(&token, connection).await.unwrap();
        assert_eq!(session.identity(), &identity);
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::UsersOnline(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.chat.history_capacity = 0;
        assert!(matches!(
            Infrastructure::from_config(&config),
            Err(InfrastructureError::Config(_))
        ));
    }

    #[test]
    fn test_redis_backend_does_not_connect_eagerly() {
        let mut config = AppConfig::default();
        config.storage.history = StorageBackend::Redis;
        config.redis.url = "redis://127.0.0.1:1".into();
        assert!(Infrastructure::from_config(&config).is_ok());
    }
}
