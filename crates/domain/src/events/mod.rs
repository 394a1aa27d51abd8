//! 连接事件定义
//!
//! 客户端意图与服务端事件。

pub mod chat_event;

// 重新导出事件类型
pub use chat_event::*;
