//! 领域模型错误定义
//!
//! 领域层只产生校验类错误：内容为空、房间/用户标识格式不正确等。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 参数校验失败
    #[error("验证失败: {field}: {message}")]
    InvalidArgument { field: String, message: String },

    /// 会话不在目标房间中
    #[error("不在房间中: {room_id}")]
    NotInRoom { room_id: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建不在房间中的错误
    pub fn not_in_room(room_id: impl Into<String>) -> Self {
        Self::NotInRoom {
            room_id: room_id.into(),
        }
    }
}
