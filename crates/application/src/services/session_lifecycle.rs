use std::sync::Arc;

use domain::{AuthError, CredentialVerifier, OnlineUser, ServerEvent};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    clock::Clock,
    connection::ConnectionHandle,
    error::ApplicationError,
    presence::{PresenceRecord, PresenceRegistry, PresenceStore},
    rooms::RoomMembership,
    services::message_router::MessageRouter,
    session::Session,
};

pub struct SessionLifecycleDependencies {
    pub verifier: Arc<dyn CredentialVerifier>,
    pub presence: Arc<PresenceRegistry>,
    pub presence_store: Arc<dyn PresenceStore>,
    pub rooms: Arc<RoomMembership>,
    pub router: Arc<MessageRouter>,
    pub clock: Arc<dyn Clock>,
}

/// 会话生命周期：认证、上线、下线
pub struct SessionLifecycle {
    deps: SessionLifecycleDependencies,
}

impl SessionLifecycle {
    pub fn new(deps: SessionLifecycleDependencies) -> Self {
        Self { deps }
    }

    /// 建立会话
    ///
    /// 认证失败时返回错误，不创建会话，传输层应拒绝该连接。
    /// 成功后依次：登记在线、加入默认房间、通知其他用户、
    /// 向新会话发送在线用户快照和默认房间历史。
    #[instrument(skip(self, credential, connection), fields(connection_id = %connection.id()))]
    pub async fn on_connect(
        &self,
        credential: &str,
        connection: ConnectionHandle,
    ) -> Result<Arc<Session>, ApplicationError> {
        if credential.trim().is_empty() {
            warn!("Connection refused: missing credential");
            return Err(AuthError::MissingCredential.into());
        }

        let identity = self.deps.verifier.verify(credential).await.map_err(|err| {
            warn!(error = %err, "Connection refused: credential rejected");
            err
        })?;

        let now = self.deps.clock.now();
        let settings = self.deps.router.settings();
        let session = Arc::new(Session::new(
            identity.clone(),
            connection.clone(),
            now,
            settings.default_room.clone(),
        ));

        if let Some(previous) = self
            .deps
            .presence
            .register(identity.clone(), connection, now)
            .await
        {
            info!(
                user_id = %identity.id,
                previous_connection = %previous.connection.id(),
                "Replaced previous connection"
            );
        }

        if let Err(err) = self
            .deps
            .presence_store
            .save(&PresenceRecord::online(&identity, now))
            .await
        {
            error!(user_id = %identity.id, error = %err, "Failed to persist presence");
        }

        let default_room = settings.default_room.clone();
        if let Err(err) = self.deps.router.enter_room(&session, &default_room).await {
            warn!(user_id = %identity.id, error = %err, "Failed to join default room");
        }

        if settings.pushes_live() {
            let joined = ServerEvent::UserJoined(OnlineUser::from_identity(&identity, now));
            for other in self.deps.presence.connections_except(&identity.id).await {
                if let Err(err) = other.deliver(joined.clone()) {
                    debug!(connection_id = %other.id(), error = %err, "Skipped user-joined delivery");
                }
            }
        }

        let snapshot = self.deps.presence.snapshot().await;
        if let Err(err) = session.connection().deliver(ServerEvent::UsersOnline(snapshot)) {
            warn!(user_id = %identity.id, error = %err, "Failed to deliver online users");
        }

        // 历史重放失败不影响会话建立
        if let Err(err) = self.deps.router.replay_room(&session, &default_room).await {
            self.deps.router.report_error(&session, &err);
        }

        info!(
            user_id = %identity.id,
            username = %identity.username,
            "User connected"
        );
        Ok(session)
    }

    /// 关闭会话。重复调用无副作用。
    ///
    /// 已被同一用户的新连接取代的旧会话只清理自己的房间成员关系，
    /// 不影响新连接的在线状态，也不广播下线。
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn on_disconnect(&self, session: &Session) {
        if !session.close() {
            debug!("Session already closed");
            return;
        }

        let rooms = self
            .deps
            .rooms
            .remove_connection(session.connection_id())
            .await;

        let removed = self
            .deps
            .presence
            .unregister_connection(session.user_id(), session.connection_id())
            .await;
        if removed.is_none() {
            info!(rooms = rooms.len(), "Superseded session closed");
            return;
        }

        if self.persist_offline(session).await {
            info!(rooms = rooms.len(), "Session closed, user reconnected meanwhile");
            return;
        }

        if self.deps.router.settings().pushes_live() {
            let left = ServerEvent::UserLeft(session.user_id().clone());
            for other in self.deps.presence.connections_except(session.user_id()).await {
                if let Err(err) = other.deliver(left.clone()) {
                    debug!(connection_id = %other.id(), error = %err, "Skipped user-left delivery");
                }
            }
        }

        info!(rooms = rooms.len(), "User disconnected");
    }

    /// 删除持久化的在线记录，返回用户是否已重新连接
    ///
    /// 新连接可能在删除前后登记，删除后仍在线时按新连接重新写入记录。
    async fn persist_offline(&self, session: &Session) -> bool {
        let user_id = session.user_id();
        if self.deps.presence.is_online(user_id).await {
            return true;
        }

        if let Err(err) = self.deps.presence_store.remove(user_id).await {
            error!(error = %err, "Failed to remove persisted presence");
        }

        let Some(entry) = self.deps.presence.lookup(user_id).await else {
            return false;
        };
        let record = PresenceRecord::online(&entry.identity, entry.connected_at);
        if let Err(err) = self.deps.presence_store.save(&record).await {
            error!(error = %err, "Failed to restore persisted presence");
        }
        true
    }

    /// 持久化存储中有效期内的在线用户，轮询部署用它代替实时推送
    pub async fn active_users(&self) -> Result<Vec<OnlineUser>, ApplicationError> {
        let records = self
            .deps
            .presence_store
            .load_active(self.deps.clock.now())
            .await?;
        Ok(records.into_iter().map(OnlineUser::from).collect())
    }
}
