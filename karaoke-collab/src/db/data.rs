use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};

use super::DatabaseError;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A karaoke account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub username: String,
    pub display_name: String,
    /// Admins may move and remove anyone's queue items
    pub is_admin: bool,
}

/// Login session data, created by the authentication step
#[derive(Debug, Clone)]
pub struct SessionData {
    pub token: String,
    /// The user that is logged in
    pub user: UserData,
    /// The room the user signed into
    pub room_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Open,
    Closed,
}

/// A karaoke room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    pub name: String,
    pub status: RoomStatus,
    /// Argon2 hash of the room password, if the room has one
    pub password: Option<String>,
}

/// A single entry of a room's queue, joined with what the clients need to show it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemData {
    pub queue_id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub user_display_name: String,
    /// The entry played right before this one, `None` for the head of the queue
    pub prev_queue_id: Option<PrimaryKey>,
    pub song_id: Option<PrimaryKey>,
    pub youtube_video_id: Option<String>,
    /// Present when the referenced YouTube video row exists
    pub youtube_video: Option<QueuedVideoData>,
}

/// The part of a YouTube video that is shown in the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedVideoData {
    pub status: YoutubeVideoStatus,
    pub title: String,
    pub artist: String,
    pub duration: f32,
    pub thumbnail: String,
    pub karaoke: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YoutubeVideoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// A YouTube video referenced by one or more queue items
#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeVideoData {
    pub youtube_video_id: String,
    /// The user who first submitted the video
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    /// Duration in seconds
    pub duration: f32,
    pub thumbnail: String,
    pub url: String,
    pub lyrics: String,
    /// Whether the video is already an instrumental karaoke version
    pub karaoke: bool,
    pub status: YoutubeVideoStatus,
    pub created_at: DateTime<Utc>,
}

/// What happened when a video row was resolved for a new queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolution {
    /// No row existed, a pending one was created
    Created,
    /// A failed row was deleted and a pending one created in its place
    Recreated,
    /// A row already exists and was left alone
    Existing(YoutubeVideoStatus),
}

/// The writes needed to resolve a video row, decided from the existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPlan {
    Insert,
    Replace,
    Keep(YoutubeVideoStatus),
}

impl VideoPlan {
    pub fn for_existing(existing: Option<&YoutubeVideoData>) -> Self {
        match existing.map(|v| v.status) {
            None => Self::Insert,
            Some(YoutubeVideoStatus::Failed) => Self::Replace,
            Some(status) => Self::Keep(status),
        }
    }
}

impl YoutubeVideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl Display for YoutubeVideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YoutubeVideoStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(DatabaseError::Corrupt(format!(
                "unknown youtube video status {other}"
            ))),
        }
    }
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(DatabaseError::Corrupt(format!("unknown room status {other}"))),
        }
    }
}

#[cfg(test)]
impl UserData {
    pub fn mock(id: PrimaryKey, name: &str) -> Self {
        Self {
            id,
            username: name.to_lowercase(),
            display_name: name.to_string(),
            is_admin: false,
        }
    }
}
