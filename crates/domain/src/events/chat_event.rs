//! 聊天相关的连接事件
//!
//! 客户端意图（入站）和服务端事件（出站）。传输层按
//! `{"event": "<名称>", "data": ...}` 的格式原样转发。

use serde::{Deserialize, Serialize};

use crate::entities::{identity::OnlineUser, message::Message};
use crate::value_objects::UserId;

/// 输入状态提示的目标：指定房间、指定用户，或都不指定（使用当前房间）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
}

/// 客户端意图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientIntent {
    /// 发送消息。带 recipientId 为私聊，否则发往房间
    #[serde(rename_all = "camelCase")]
    SendMessage {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_id: Option<String>,
    },
    /// 加入房间
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    /// 离开房间
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String },
    /// 加载与某个用户的私聊记录
    #[serde(rename_all = "camelCase")]
    LoadPrivateMessages { user_id: String },
    /// 开始输入
    Typing(TypingTarget),
    /// 停止输入
    StopTyping(TypingTarget),
}

impl ClientIntent {
    /// 获取意图名称
    pub fn name(&self) -> &'static str {
        match self {
            ClientIntent::SendMessage { .. } => "send-message",
            ClientIntent::JoinRoom { .. } => "join-room",
            ClientIntent::LeaveRoom { .. } => "leave-room",
            ClientIntent::LoadPrivateMessages { .. } => "load-private-messages",
            ClientIntent::Typing(_) => "typing",
            ClientIntent::StopTyping(_) => "stop-typing",
        }
    }
}

/// 服务端事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// 新消息
    MessageReceived(Message),
    /// 房间历史消息，按时间升序
    HistoricalMessages(Vec<Message>),
    /// 私聊历史，带上对方ID以便客户端归档到正确的会话
    #[serde(rename_all = "camelCase")]
    PrivateMessagesLoaded {
        user_id: UserId,
        messages: Vec<Message>,
    },
    /// 在线用户快照
    UsersOnline(Vec<OnlineUser>),
    /// 有用户上线
    UserJoined(OnlineUser),
    /// 有用户下线
    UserLeft(UserId),
    /// 用户正在输入
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: UserId, username: String },
    /// 用户停止输入
    UserStoppedTyping(UserId),
    /// 请求处理失败，仅发给请求方
    Error { code: String, message: String },
}

impl ServerEvent {
    /// 获取事件名称
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::MessageReceived(_) => "message-received",
            ServerEvent::HistoricalMessages(_) => "historical-messages",
            ServerEvent::PrivateMessagesLoaded { .. } => "private-messages-loaded",
            ServerEvent::UsersOnline(_) => "users-online",
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::UserTyping { .. } => "user-typing",
            ServerEvent::UserStoppedTyping(_) => "user-stopped-typing",
            ServerEvent::Error { .. } => "error",
        }
    }
}
