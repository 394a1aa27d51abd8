//! 聊天核心装配
//!
//! 把在线表、房间成员关系、消息路由和会话生命周期组装在一起，
//! 传输层只需要持有一个 [`ChatEngine`]。

use std::sync::Arc;

use config::ChatConfig;
use domain::{ClientIntent, CredentialVerifier, ServerEvent};
use tokio::sync::mpsc;

use crate::{
    clock::Clock,
    connection::ConnectionHandle,
    error::ApplicationError,
    history::HistoryStore,
    presence::{PresenceRegistry, PresenceStore},
    rooms::RoomMembership,
    services::{
        MessageRouter, MessageRouterDependencies, RouterSettings, SessionLifecycle,
        SessionLifecycleDependencies,
    },
    session::Session,
};

pub struct ChatEngineDependencies {
    pub verifier: Arc<dyn CredentialVerifier>,
    pub history: Arc<dyn HistoryStore>,
    pub presence_store: Arc<dyn PresenceStore>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatEngine {
    presence: Arc<PresenceRegistry>,
    rooms: Arc<RoomMembership>,
    router: Arc<MessageRouter>,
    lifecycle: SessionLifecycle,
    outbound_buffer: usize,
}

impl ChatEngine {
    pub fn new(deps: ChatEngineDependencies, config: &ChatConfig) -> Result<Self, ApplicationError> {
        let settings = RouterSettings::from_config(config)?;
        let presence = Arc::new(PresenceRegistry::new());
        let rooms = Arc::new(RoomMembership::new());

        let router = Arc::new(MessageRouter::new(
            MessageRouterDependencies {
                history: deps.history,
                presence: presence.clone(),
                rooms: rooms.clone(),
                clock: deps.clock.clone(),
            },
            settings,
        ));

        let lifecycle = SessionLifecycle::new(SessionLifecycleDependencies {
            verifier: deps.verifier,
            presence: presence.clone(),
            presence_store: deps.presence_store,
            rooms: rooms.clone(),
            router: router.clone(),
            clock: deps.clock,
        });

        Ok(Self {
            presence,
            rooms,
            router,
            lifecycle,
            outbound_buffer: config.outbound_buffer.max(1),
        })
    }

    /// 为新连接创建出站队列
    pub fn open_connection(&self) -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        ConnectionHandle::channel(self.outbound_buffer)
    }

    pub async fn connect(
        &self,
        credential: &str,
        connection: ConnectionHandle,
    ) -> Result<Arc<Session>, ApplicationError> {
        self.lifecycle.on_connect(credential, connection).await
    }

    pub async fn handle_intent(
        &self,
        session: &Session,
        intent: ClientIntent,
    ) -> Result<(), ApplicationError> {
        self.router.handle_intent(session, intent).await
    }

    pub async fn handle_text(&self, session: &Session, payload: &str) -> Result<(), ApplicationError> {
        self.router.handle_text(session, payload).await
    }

    pub async fn disconnect(&self, session: &Session) {
        self.lifecycle.on_disconnect(session).await
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }
}
