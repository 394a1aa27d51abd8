use std::sync::Arc;

use config::{ChatConfig, DeliveryMode};
use domain::{
    ClientIntent, ConversationKey, DomainError, Message, MessageContent, MessageId, RoomId,
    ServerEvent, TypingTarget, UserId,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    clock::Clock,
    connection::ConnectionHandle,
    error::ApplicationError,
    history::{HistoryStore, DEFAULT_REPLAY_LIMIT},
    presence::PresenceRegistry,
    rooms::{RoomMember, RoomMembership},
    session::Session,
};

#[derive(Debug, Clone, Default)]
pub struct SendMessageRequest {
    pub content: String,
    /// 目标房间，必须是已加入的房间；缺省时使用当前房间
    pub room_id: Option<String>,
    /// 私聊对象；存在时忽略 room_id
    pub recipient_id: Option<String>,
}

/// 路由参数
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub default_room: RoomId,
    pub replay_limit: usize,
    pub delivery_mode: DeliveryMode,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_room: RoomId::general(),
            replay_limit: DEFAULT_REPLAY_LIMIT,
            delivery_mode: DeliveryMode::Push,
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &ChatConfig) -> Result<Self, DomainError> {
        Ok(Self {
            default_room: RoomId::parse(config.default_room.clone())?,
            replay_limit: config.replay_limit,
            delivery_mode: config.delivery_mode,
        })
    }

    pub fn pushes_live(&self) -> bool {
        self.delivery_mode == DeliveryMode::Push
    }
}

pub struct MessageRouterDependencies {
    pub history: Arc<dyn HistoryStore>,
    pub presence: Arc<PresenceRegistry>,
    pub rooms: Arc<RoomMembership>,
    pub clock: Arc<dyn Clock>,
}

/// 消息路由：校验、持久化、投递
pub struct MessageRouter {
    deps: MessageRouterDependencies,
    settings: RouterSettings,
}

impl MessageRouter {
    pub fn new(deps: MessageRouterDependencies, settings: RouterSettings) -> Self {
        Self { deps, settings }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// 发送消息
    ///
    /// 先写入历史记录再投递。持久化失败时不投递，错误返回给调用方；
    /// 投递失败只记录日志。
    #[instrument(skip(self, session, request), fields(user_id = %session.user_id()))]
    pub async fn send_message(
        &self,
        session: &Session,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        ensure_open(session)?;
        let content = MessageContent::new(request.content)?;
        let now = self.deps.clock.now();

        let message = match non_empty(request.recipient_id) {
            Some(recipient) => {
                let recipient_id = UserId::parse(recipient)?;
                Message::private(
                    MessageId::generate(),
                    session.identity(),
                    content,
                    recipient_id,
                    now,
                )
            }
            None => {
                let room_id = match non_empty(request.room_id) {
                    Some(room) => RoomId::parse(room)?,
                    None => session.active_room().await,
                };
                if !self
                    .deps
                    .rooms
                    .is_member(&room_id, session.connection_id())
                    .await
                {
                    return Err(DomainError::not_in_room(room_id.as_str()).into());
                }
                Message::public(MessageId::generate(), session.identity(), content, room_id, now)
            }
        };

        let key = message.conversation_key();
        if let Err(err) = self.deps.history.append(&key, &message).await {
            error!(conversation = %key, message_id = %message.id, error = %err, "Failed to persist message");
            return Err(err.into());
        }
        debug!(conversation = %key, message_id = %message.id, "Message persisted");

        if self.settings.pushes_live() {
            self.dispatch(session, &message).await;
        }

        Ok(message)
    }

    async fn dispatch(&self, session: &Session, message: &Message) {
        let event = ServerEvent::MessageReceived(message.clone());

        if let Some(room_id) = message.room_id() {
            let delivered = self.deps.rooms.broadcast(room_id, &event, None).await;
            debug!(room_id = %room_id, delivered, "Room message delivered");
            return;
        }

        if let Some(recipient_id) = message.recipient_id() {
            match self.deps.presence.lookup(recipient_id).await {
                Some(entry) if entry.connection.id() != session.connection_id() => {
                    self.deliver(&entry.connection, recipient_id, event.clone());
                }
                Some(_) => {}
                None => {
                    debug!(recipient_id = %recipient_id, "Recipient offline, message kept in history");
                }
            }
        }

        // 私聊消息总是回送给发送方
        self.deliver(session.connection(), session.user_id(), event);
    }

    fn deliver(&self, connection: &ConnectionHandle, user_id: &UserId, event: ServerEvent) {
        let name = event.name();
        if let Err(err) = connection.deliver(event) {
            warn!(
                user_id = %user_id,
                connection_id = %connection.id(),
                event = name,
                error = %err,
                "Failed to deliver event"
            );
        }
    }

    /// 读取房间历史并只发给该会话
    pub async fn replay_room(
        &self,
        session: &Session,
        room_id: &RoomId,
    ) -> Result<Vec<Message>, ApplicationError> {
        let key = ConversationKey::room(room_id);
        let messages = self
            .deps
            .history
            .read(&key, self.settings.replay_limit)
            .await
            .map_err(|err| {
                error!(conversation = %key, error = %err, "Failed to read history");
                err
            })?;

        self.deliver(
            session.connection(),
            session.user_id(),
            ServerEvent::HistoricalMessages(messages.clone()),
        );
        Ok(messages)
    }

    /// 加入房间并重放该房间的历史，新房间成为当前房间
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn join_room(
        &self,
        session: &Session,
        room_id: &str,
    ) -> Result<Vec<Message>, ApplicationError> {
        ensure_open(session)?;
        let room_id = RoomId::parse(room_id)?;
        self.enter_room(session, &room_id).await?;
        self.replay_room(session, &room_id).await
    }

    /// 只登记成员关系，不重放历史
    ///
    /// 断开清理可能先于登记完成，登记后发现会话已关闭时撤销这次加入。
    pub(crate) async fn enter_room(
        &self,
        session: &Session,
        room_id: &RoomId,
    ) -> Result<(), ApplicationError> {
        ensure_open(session)?;
        let member = RoomMember {
            user_id: session.user_id().clone(),
            connection: session.connection().clone(),
        };
        let joined = self.deps.rooms.join(room_id, member).await;
        if session.is_closed() {
            self.deps.rooms.leave(room_id, session.connection_id()).await;
            debug!(user_id = %session.user_id(), room_id = %room_id, "Join undone for closed session");
            return Err(ApplicationError::SessionClosed);
        }
        if joined {
            info!(user_id = %session.user_id(), room_id = %room_id, "User joined room");
        }
        session.enter_room(room_id).await;
        Ok(())
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn leave_room(&self, session: &Session, room_id: &str) -> Result<(), ApplicationError> {
        ensure_open(session)?;
        let room_id = RoomId::parse(room_id)?;
        if self
            .deps
            .rooms
            .leave(&room_id, session.connection_id())
            .await
        {
            info!(room_id = %room_id, "User left room");
        }
        session.exit_room(&room_id).await;
        Ok(())
    }

    /// 加载与另一个用户的私聊记录，只发给请求方
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn load_private_messages(
        &self,
        session: &Session,
        other_user_id: &str,
    ) -> Result<Vec<Message>, ApplicationError> {
        ensure_open(session)?;
        let other = UserId::parse(other_user_id)?;
        let key = ConversationKey::private(session.user_id(), &other);
        let messages = self
            .deps
            .history
            .read(&key, self.settings.replay_limit)
            .await
            .map_err(|err| {
                error!(conversation = %key, error = %err, "Failed to read history");
                err
            })?;

        self.deliver(
            session.connection(),
            session.user_id(),
            ServerEvent::PrivateMessagesLoaded {
                user_id: other,
                messages: messages.clone(),
            },
        );
        Ok(messages)
    }

    /// 输入状态提示。不持久化，发给房间内其他成员或私聊对象。
    pub async fn typing(
        &self,
        session: &Session,
        target: TypingTarget,
        active: bool,
    ) -> Result<(), ApplicationError> {
        ensure_open(session)?;
        let event = if active {
            ServerEvent::UserTyping {
                user_id: session.user_id().clone(),
                username: session.identity().username.clone(),
            }
        } else {
            ServerEvent::UserStoppedTyping(session.user_id().clone())
        };

        if let Some(recipient) = non_empty(target.recipient_id) {
            let recipient_id = UserId::parse(recipient)?;
            if !self.settings.pushes_live() {
                return Ok(());
            }
            if let Some(entry) = self.deps.presence.lookup(&recipient_id).await {
                self.deliver(&entry.connection, &recipient_id, event);
            }
            return Ok(());
        }

        let room_id = match non_empty(target.room_id) {
            Some(room) => RoomId::parse(room)?,
            None => session.active_room().await,
        };
        if self.settings.pushes_live() {
            self.deps
                .rooms
                .broadcast(&room_id, &event, Some(session.connection_id()))
                .await;
        }
        Ok(())
    }

    /// 处理一条客户端意图。失败时向该会话发送 `error` 事件，并把错误返回给调用方。
    pub async fn handle_intent(
        &self,
        session: &Session,
        intent: ClientIntent,
    ) -> Result<(), ApplicationError> {
        let name = intent.name();
        if session.is_closed() {
            debug!(user_id = %session.user_id(), intent = name, "Intent dropped for closed session");
            return Err(ApplicationError::SessionClosed);
        }

        let result = match intent {
            ClientIntent::SendMessage {
                content,
                room_id,
                recipient_id,
            } => self
                .send_message(
                    session,
                    SendMessageRequest {
                        content,
                        room_id,
                        recipient_id,
                    },
                )
                .await
                .map(|_| ()),
            ClientIntent::JoinRoom { room_id } => {
                self.join_room(session, &room_id).await.map(|_| ())
            }
            ClientIntent::LeaveRoom { room_id } => self.leave_room(session, &room_id).await,
            ClientIntent::LoadPrivateMessages { user_id } => self
                .load_private_messages(session, &user_id)
                .await
                .map(|_| ()),
            ClientIntent::Typing(target) => self.typing(session, target, true).await,
            ClientIntent::StopTyping(target) => self.typing(session, target, false).await,
        };

        match &result {
            Err(ApplicationError::SessionClosed) => {
                debug!(user_id = %session.user_id(), intent = name, "Session closed while handling intent");
            }
            Err(err) => {
                warn!(user_id = %session.user_id(), intent = name, error = %err, "Intent failed");
                self.report_error(session, err);
            }
            Ok(()) => {}
        }
        result
    }

    /// 解析并处理一条原始 JSON 意图
    pub async fn handle_text(&self, session: &Session, payload: &str) -> Result<(), ApplicationError> {
        match serde_json::from_str::<ClientIntent>(payload) {
            Ok(intent) => self.handle_intent(session, intent).await,
            Err(err) => {
                let err: ApplicationError =
                    DomainError::invalid_argument("payload", err.to_string()).into();
                warn!(user_id = %session.user_id(), error = %err, "Malformed intent");
                self.report_error(session, &err);
                Err(err)
            }
        }
    }

    pub(crate) fn report_error(&self, session: &Session, err: &ApplicationError) {
        self.deliver(
            session.connection(),
            session.user_id(),
            ServerEvent::Error {
                code: err.kind_code().to_string(),
                message: err.to_string(),
            },
        );
    }
}

fn ensure_open(session: &Session) -> Result<(), ApplicationError> {
    if session.is_closed() {
        return Err(ApplicationError::SessionClosed);
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
