//! 应用层实现。
//!
//! 聊天核心的用例：会话生命周期、在线状态、房间成员关系、消息路由，
//! 以及对外部适配器（凭证验证、历史存储、在线状态存储）的抽象。

pub mod clock;
pub mod connection;
pub mod engine;
pub mod error;
pub mod history;
pub mod presence;
pub mod rooms;
pub mod services;
pub mod session;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::DeliveryMode;
pub use connection::{ChannelSink, ConnectionHandle, ConnectionId, DeliveryError, EventSink};
pub use engine::{ChatEngine, ChatEngineDependencies};
pub use error::{ApplicationError, StoreError};
pub use history::{
    memory::MemoryHistoryStore, HistoryStore, DEFAULT_HISTORY_CAPACITY, DEFAULT_REPLAY_LIMIT,
};
pub use presence::{
    memory::MemoryPresenceStore, PresenceEntry, PresenceRecord, PresenceRegistry, PresenceStore,
};
pub use rooms::{RoomMember, RoomMembership};
pub use services::{
    MessageRouter, MessageRouterDependencies, RouterSettings, SendMessageRequest,
    SessionLifecycle, SessionLifecycleDependencies,
};
pub use session::Session;
