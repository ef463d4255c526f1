//! Everything sent to clients is defined here
//! along with the ToSerialized impls

use std::collections::BTreeMap;

use karaoke_collab::{Acknowledgement, Notice, NoticeKind, Queue, QueueItemData};
use serde::Serialize;
use utoipa::ToSchema;

pub const QUEUE_PUSH: &str = "QUEUE_PUSH";

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    queue_id: i32,
    room_id: i32,
    user_id: i32,
    user_display_name: String,
    prev_queue_id: Option<i32>,
    song_id: Option<i32>,
    youtube_video_id: Option<String>,
    youtube_video_status: Option<String>,
    youtube_video_title: Option<String>,
    youtube_video_artist: Option<String>,
    youtube_video_duration: Option<f32>,
    youtube_video_thumbnail: Option<String>,
    youtube_video_karaoke: Option<bool>,
}

/// A queue as ids in play order, with the items keyed by id
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NormalizedQueue {
    result: Vec<i32>,
    entities: BTreeMap<i32, QueueItem>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Error,
}

/// A message sent over the gateway
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The answer to a client message that had an `ackId`
    Ack {
        #[serde(rename = "ackId", skip_serializing_if = "Option::is_none")]
        ack_id: Option<u64>,
        /// `<ACTION>_SUCCESS` or `<ACTION>_ERROR`
        #[serde(rename = "type")]
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The room's queue changed
    Action {
        #[serde(rename = "type")]
        kind: String,
        payload: NormalizedQueue,
    },
    /// A message only for this connection
    Toast {
        content: String,
        #[serde(rename = "type")]
        kind: ToastKind,
    },
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<QueueItem> for QueueItemData {
    fn to_serialized(&self) -> QueueItem {
        let video = self.youtube_video.as_ref();

        QueueItem {
            queue_id: self.queue_id,
            room_id: self.room_id,
            user_id: self.user_id,
            user_display_name: self.user_display_name.clone(),
            prev_queue_id: self.prev_queue_id,
            song_id: self.song_id,
            youtube_video_id: self.youtube_video_id.clone(),
            youtube_video_status: video.map(|v| v.status.to_string()),
            youtube_video_title: video.map(|v| v.title.clone()),
            youtube_video_artist: video.map(|v| v.artist.clone()),
            youtube_video_duration: video.map(|v| v.duration),
            youtube_video_thumbnail: video.map(|v| v.thumbnail.clone()),
            youtube_video_karaoke: video.map(|v| v.karaoke),
        }
    }
}

impl ToSerialized<NormalizedQueue> for Queue {
    fn to_serialized(&self) -> NormalizedQueue {
        NormalizedQueue {
            result: self.ids(),
            entities: self
                .items
                .iter()
                .map(|i| (i.queue_id, i.to_serialized()))
                .collect(),
        }
    }
}

impl ToSerialized<ServerMessage> for Notice {
    fn to_serialized(&self) -> ServerMessage {
        ServerMessage::Toast {
            content: self.content.clone(),
            kind: match self.kind {
                NoticeKind::Info => ToastKind::Info,
                NoticeKind::Error => ToastKind::Error,
            },
        }
    }
}

impl ToSerialized<ServerMessage> for Queue {
    fn to_serialized(&self) -> ServerMessage {
        ServerMessage::Action {
            kind: QUEUE_PUSH.to_string(),
            payload: self.to_serialized(),
        }
    }
}

impl ServerMessage {
    pub fn ack(ack_id: Option<u64>, ack: &Acknowledgement) -> Self {
        let action = ack.kind().as_str();

        match ack {
            Acknowledgement::Success(_) => Self::Ack {
                ack_id,
                kind: format!("{}_SUCCESS", action),
                error: None,
            },
            Acknowledgement::Error { message, .. } => Self::error_ack(ack_id, action, message),
        }
    }

    /// Rejects a message before it reaches the collab system
    pub fn error_ack(ack_id: Option<u64>, action: &str, error: &str) -> Self {
        Self::Ack {
            ack_id,
            kind: format!("{}_ERROR", action),
            error: Some(error.to_string()),
        }
    }
}
