//! 会话
//!
//! 一个已认证的连接。身份在会话期间不变；已加入的房间和当前房间随意图变化。

use std::collections::BTreeSet;

use domain::{Identity, RoomId, Timestamp, UserId};
use tokio::sync::Mutex;

use crate::connection::{ConnectionHandle, ConnectionId};

struct SessionRooms {
    joined: BTreeSet<RoomId>,
    active: RoomId,
}

pub struct Session {
    identity: Identity,
    connection: ConnectionHandle,
    connected_at: Timestamp,
    default_room: RoomId,
    rooms: Mutex<SessionRooms>,
}

impl Session {
    pub fn new(
        identity: Identity,
        connection: ConnectionHandle,
        connected_at: Timestamp,
        default_room: RoomId,
    ) -> Self {
        Self {
            identity,
            connection,
            connected_at,
            rooms: Mutex::new(SessionRooms {
                joined: BTreeSet::new(),
                active: default_room.clone(),
            }),
            default_room,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> &UserId {
        &self.identity.id
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn connected_at(&self) -> Timestamp {
        self.connected_at
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// 标记会话关闭，之后不再向该连接投递任何事件。返回是否为首次关闭。
    pub fn close(&self) -> bool {
        self.connection.close()
    }

    /// 记录加入的房间并将其设为当前房间
    pub async fn enter_room(&self, room_id: &RoomId) {
        let mut rooms = self.rooms.lock().await;
        rooms.joined.insert(room_id.clone());
        rooms.active = room_id.clone();
    }

    /// 记录离开的房间。
    ///
    /// 离开当前房间时切换到仍在的房间：优先默认房间，其次任一已加入的房间。
    /// 一个房间都不剩时当前房间回到默认房间。
    pub async fn exit_room(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let removed = rooms.joined.remove(room_id);
        if rooms.active == *room_id {
            let fallback = if rooms.joined.contains(&self.default_room) {
                Some(self.default_room.clone())
            } else {
                rooms.joined.iter().next().cloned()
            };
            rooms.active = fallback.unwrap_or_else(|| self.default_room.clone());
        }
        removed
    }

    pub async fn active_room(&self) -> RoomId {
        self.rooms.lock().await.active.clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.identity.id)
            .field("connection", &self.connection)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
