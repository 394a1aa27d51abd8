//! 聊天核心领域模型
//!
//! 身份、消息、会话键以及连接上收发的事件格式。

pub mod entities;
pub mod errors;
pub mod events;
pub mod services;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use services::*;
pub use value_objects::*;
