//! 连接句柄
//!
//! 核心不关心具体传输层，只通过 [`EventSink`] 向连接投递 [`ServerEvent`]。
//! 投递是非阻塞的：缓冲区满或连接关闭时立即返回错误，调用方记录日志后继续。

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use domain::ServerEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 连接ID，每个传输连接唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
    #[error("outbound buffer full")]
    Full,
}

/// 出站事件接收端
pub trait EventSink: Send + Sync {
    /// 尝试投递事件，不等待
    fn try_deliver(&self, event: ServerEvent) -> Result<(), DeliveryError>;
}

/// 基于有界 mpsc 通道的出站队列，传输层从对应的 Receiver 读取并写出
pub struct ChannelSink {
    sender: mpsc::Sender<ServerEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn try_deliver(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// 连接句柄。可廉价克隆，所有克隆共享关闭状态。
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sink: Arc<dyn EventSink>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            id: ConnectionId::generate(),
            sink,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 创建一个带有界出站缓冲区的连接
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(Arc::new(ChannelSink::new(sender))), receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 投递事件。关闭后的句柄拒绝一切投递。
    pub fn deliver(&self, event: ServerEvent) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sink.try_deliver(event)
    }

    /// 关闭句柄，返回是否为首次关闭
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::UserId;

    fn event() -> ServerEvent {
        ServerEvent::UserLeft(UserId::parse("alice").unwrap())
    }

    #[tokio::test]
    async fn test_deliver_through_channel() {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        handle.deliver(event()).unwrap();
        assert_eq!(rx.recv().await, Some(event()));
    }

    #[tokio::test]
    async fn test_full_buffer_does_not_block() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        handle.deliver(event()).unwrap();
        assert_eq!(handle.deliver(event()), Err(DeliveryError::Full));
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_delivery() {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        let clone = handle.clone();

        assert!(handle.close());
        assert!(!handle.close());
        assert!(clone.is_closed());
        assert_eq!(clone.deliver(event()), Err(DeliveryError::Closed));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_receiver_reports_closed() {
        let (handle, rx) = ConnectionHandle::channel(4);
        drop(rx);
        assert_eq!(handle.deliver(event()), Err(DeliveryError::Closed));
    }
}
