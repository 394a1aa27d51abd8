pub mod message_router;
pub mod session_lifecycle;

pub use message_router::{
    MessageRouter, MessageRouterDependencies, RouterSettings, SendMessageRequest,
};
pub use session_lifecycle::{SessionLifecycle, SessionLifecycleDependencies};
