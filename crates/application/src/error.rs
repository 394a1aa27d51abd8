use domain::{AuthError, DomainError};
use thiserror::Error;

/// 历史记录 / 在线状态存储错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// 后端不可用（连接失败、超时等）
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// 存储中的记录无法解析
    #[error("corrupted record under {key}: {message}")]
    Corrupted { key: String, message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }

    pub fn corrupted(key: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Corrupted {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    #[error("validation failed: {0}")]
    Validation(#[from] DomainError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// 会话已断开，不再处理任何请求
    #[error("session closed")]
    SessionClosed,
}

impl ApplicationError {
    /// 返回给客户端的错误码
    pub fn kind_code(&self) -> &'static str {
        match self {
            ApplicationError::Authentication(_) => "auth_failed",
            ApplicationError::Validation(_) => "validation_failed",
            ApplicationError::Store(_) => "store_unavailable",
            ApplicationError::SessionClosed => "session_closed",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApplicationError::Validation(_))
    }
}
