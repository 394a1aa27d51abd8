//! 凭证验证服务接口
//!
//! 核心只消费这个接口：给定连接携带的凭证，返回用户身份或认证错误。

use async_trait::async_trait;
use thiserror::Error;

use crate::entities::identity::Identity;

/// 认证错误。连接会被拒绝，不会创建会话。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// 未提供凭证
    #[error("missing credential")]
    MissingCredential,
    /// 凭证无效
    #[error("invalid credential: {0}")]
    InvalidToken(String),
    /// 凭证已过期
    #[error("credential expired")]
    TokenExpired,
    /// 验证服务内部错误
    #[error("credential verifier unavailable: {0}")]
    Unavailable(String),
}

/// 凭证验证器
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// 验证凭证并返回身份
    async fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}
