//! 消息实体定义
//!
//! 公开消息属于某个房间，私聊消息属于一对用户。两者通过会话键寻址历史记录。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::identity::Identity;
use crate::value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId};

/// 消息投递目标
///
/// 序列化为扁平字段：`"type": "public", "roomId": ...` 或
/// `"type": "private", "recipientId": ...`，与客户端约定一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageTarget {
    Public {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    Private {
        #[serde(rename = "recipientId")]
        recipient_id: UserId,
    },
}

/// 消息实体。创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: MessageContent,
    pub sender_id: UserId,
    pub sender_username: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub target: MessageTarget,
}

impl Message {
    /// 创建房间消息
    pub fn public(
        id: MessageId,
        sender: &Identity,
        content: MessageContent,
        room_id: RoomId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            content,
            sender_id: sender.id.clone(),
            sender_username: sender.username.clone(),
            timestamp,
            target: MessageTarget::Public { room_id },
        }
    }

    /// 创建私聊消息
    pub fn private(
        id: MessageId,
        sender: &Identity,
        content: MessageContent,
        recipient_id: UserId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            content,
            sender_id: sender.id.clone(),
            sender_username: sender.username.clone(),
            timestamp,
            target: MessageTarget::Private { recipient_id },
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.target, MessageTarget::Private { .. })
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.target {
            MessageTarget::Public { room_id } => Some(room_id),
            MessageTarget::Private { .. } => None,
        }
    }

    pub fn recipient_id(&self) -> Option<&UserId> {
        match &self.target {
            MessageTarget::Public { .. } => None,
            MessageTarget::Private { recipient_id } => Some(recipient_id),
        }
    }

    /// 该消息所属的历史记录键
    pub fn conversation_key(&self) -> ConversationKey {
        match &self.target {
            MessageTarget::Public { room_id } => ConversationKey::room(room_id),
            MessageTarget::Private { recipient_id } => {
                ConversationKey::private(&self.sender_id, recipient_id)
            }
        }
    }
}

/// 会话键：`room:<roomId>` 或 `private:<较小id>:<较大id>`
///
/// 私聊键按字典序排列两个用户ID，无论谁发起都得到同一个键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn room(room_id: &RoomId) -> Self {
        Self(format!("room:{}", room_id))
    }

    pub fn private(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("private:{}:{}", lo, hi))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(id: &str) -> Identity {
        Identity::new(UserId::parse(id).unwrap(), id, format!("{id}@example.com"))
    }

    #[test]
    fn test_private_key_is_symmetric() {
        let a = UserId::parse("alice").unwrap();
        let b = UserId::parse("bob").unwrap();

        assert_eq!(ConversationKey::private(&a, &b), ConversationKey::private(&b, &a));
        assert_eq!(ConversationKey::private(&a, &b).as_str(), "private:alice:bob");
    }

    #[test]
    fn test_private_key_uses_lexicographic_order() {
        // 字符串序而非数值序："10" < "9"
        let ten = UserId::parse("10").unwrap();
        let nine = UserId::parse("9").unwrap();
        assert_eq!(ConversationKey::private(&nine, &ten).as_str(), "private:10:9");
    }

    #[test]
    fn test_message_keys() {
        let alice = identity("alice");
        let public = Message::public(
            MessageId::generate(),
            &alice,
            MessageContent::new("hello").unwrap(),
            RoomId::general(),
            Utc::now(),
        );
        assert_eq!(public.conversation_key().as_str(), "room:general");
        assert!(public.recipient_id().is_none());

        let private = Message::private(
            MessageId::generate(),
            &alice,
            MessageContent::new("hi").unwrap(),
            UserId::parse("bob").unwrap(),
            Utc::now(),
        );
        assert_eq!(private.conversation_key().as_str(), "private:alice:bob");
        assert!(private.room_id().is_none());
        assert!(private.is_private());
    }

    #[test]
    fn test_message_wire_format() {
        let message = Message::private(
            MessageId::generate(),
            &identity("alice"),
            MessageContent::new("hi").unwrap(),
            UserId::parse("bob").unwrap(),
            Utc::now(),
        );

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "private");
        assert_eq!(json["recipientId"], "bob");
        assert_eq!(json["senderUsername"], "alice");
        assert!(json.get("roomId").is_none());

        let decoded: Message = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, message);
    }
}
