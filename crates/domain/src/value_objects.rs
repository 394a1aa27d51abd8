use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 默认房间。连接建立时自动加入。
pub const DEFAULT_ROOM: &str = "general";

/// 标识符最大长度。
const MAX_IDENTIFIER_LEN: usize = 64;

/// 房间ID与用户ID共用的格式校验。
///
/// `:` 是存储键的分隔符，不能出现在标识符里。
fn validate_identifier(field: &str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_argument(field, "cannot be empty"));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::invalid_argument(field, "too long"));
    }
    if value.chars().any(|c| c == ':' || c.is_whitespace()) {
        return Err(DomainError::invalid_argument(
            field,
            "must not contain ':' or whitespace",
        ));
    }
    Ok(())
}

/// 用户唯一标识。由外部凭证服务签发，核心只当作不透明字符串。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate_identifier("user_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 房间名称即房间ID。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        validate_identifier("room_id", &value)?;
        Ok(Self(value))
    }

    /// 默认房间 "general"
    pub fn general() -> Self {
        Self(DEFAULT_ROOM.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::general()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 消息唯一标识。
///
/// 使用 UUID v7：前缀是毫秒时间戳，大致单调递增；后缀随机，并发生成不会碰撞。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 消息正文内容。原样保存，只拒绝去掉空白后为空的内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument(
                "content",
                "cannot be empty",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifier_validation() {
        assert!(RoomId::parse("general").is_ok());
        assert!(RoomId::parse("").is_err());
        assert!(RoomId::parse("a:b").is_err());
        assert!(RoomId::parse("with space").is_err());
        assert!(UserId::parse("x".repeat(65)).is_err());
        assert!(UserId::parse("1712345678901").is_ok());
    }

    #[test]
    fn test_blank_content_rejected() {
        assert!(MessageContent::new("").is_err());
        assert!(MessageContent::new(" \n\t ").is_err());

        let content = MessageContent::new("  hello ").unwrap();
        assert_eq!(content.as_str(), "  hello ");
    }

    #[test]
    fn test_message_ids_are_unique() {
        let ids: HashSet<MessageId> = (0..10_000).map(|_| MessageId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_default_room_is_general() {
        assert_eq!(RoomId::default().as_str(), DEFAULT_ROOM);
    }
}
