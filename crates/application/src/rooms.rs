//! 房间成员关系
//!
//! 房间在第一次加入时隐式创建，成员清空后仍保留房间记录，不做回收。

use std::collections::HashMap;

use domain::{RoomId, ServerEvent, UserId};
use tokio::sync::RwLock;
use tracing::warn;

use crate::connection::{ConnectionHandle, ConnectionId};

/// 房间成员：某个用户的某个连接
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub user_id: UserId,
    pub connection: ConnectionHandle,
}

/// 房间 -> 成员连接
#[derive(Default)]
pub struct RoomMembership {
    rooms: RwLock<HashMap<RoomId, HashMap<ConnectionId, RoomMember>>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入房间，返回是否为新加入
    pub async fn join(&self, room_id: &RoomId, member: RoomMember) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.clone())
            .or_default()
            .insert(member.connection.id(), member)
            .is_none()
    }

    /// 离开房间，返回是否确实在房间内
    pub async fn leave(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms
            .get_mut(room_id)
            .map(|members| members.remove(&connection_id).is_some())
            .unwrap_or(false)
    }

    /// 从所有房间移除该连接，返回它曾所在的房间
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        let mut rooms = self.rooms.write().await;
        rooms
            .iter_mut()
            .filter_map(|(room_id, members)| {
                members
                    .remove(&connection_id)
                    .map(|_| room_id.clone())
            })
            .collect()
    }

    pub async fn is_member(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.contains_key(&connection_id))
            .unwrap_or(false)
    }

    pub async fn members_of(&self, room_id: &RoomId) -> Vec<RoomMember> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 向房间内所有成员投递事件，可排除一个连接。返回成功投递的数量。
    ///
    /// 投递失败只记录日志，不影响其他成员。
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let members = self.members_of(room_id).await;
        let mut delivered = 0;

        for member in members {
            if Some(member.connection.id()) == exclude {
                continue;
            }
            match member.connection.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        room_id = %room_id,
                        user_id = %member.user_id,
                        connection_id = %member.connection.id(),
                        event = event.name(),
                        error = %err,
                        "Failed to deliver room event"
                    );
                }
            }
        }

        delivered
    }
}
