//! 领域实体定义

pub mod identity;
pub mod message;

// 重新导出核心实体
pub use identity::{Identity, OnlineUser};
pub use message::{ConversationKey, Message, MessageTarget};
