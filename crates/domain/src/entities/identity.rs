//! 用户身份
//!
//! 身份由凭证服务签发，会话期间不可变。核心只缓存，不负责账号存储。

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 经过验证的用户身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl Identity {
    pub fn new(id: UserId, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
        }
    }
}

/// 在线用户视图（`users-online` / `user-joined` 事件载荷）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_online: bool,
    pub last_seen: Timestamp,
}

impl OnlineUser {
    pub fn from_identity(identity: &Identity, last_seen: Timestamp) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            is_online: true,
            last_seen,
        }
    }
}
