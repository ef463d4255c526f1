use crossbeam::channel::{Receiver, Sender};

use crate::{ConnectionId, PrimaryKey, Queue};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted by the collab system, to be delivered by a transport
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A room's queue changed. Goes to every connection subscribed to `channel`.
    QueuePush {
        room_id: PrimaryKey,
        /// The broadcast channel of the room
        channel: String,
        queue: Queue,
    },
    /// A transient message only for the connection that caused it
    Notice {
        connection_id: ConnectionId,
        notice: Notice,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub content: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: NoticeKind::Info,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: NoticeKind::Error,
        }
    }
}
