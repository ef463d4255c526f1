use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod pg;
pub use pg::*;

#[cfg(test)]
mod memory;
#[cfg(test)]
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type ArcedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// A write affected a different amount of rows than it should have
    #[error("Expected {operation} of {resource} to affect {expected} row(s), but it affected {actual}")]
    UnexpectedWrite {
        resource: &'static str,
        operation: &'static str,
        expected: u64,
        actual: u64,
    },
    /// A stored value could not be understood
    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Ensures a write touched exactly the expected amount of rows
pub fn expect_rows(
    resource: &'static str,
    operation: &'static str,
    expected: u64,
    actual: u64,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }

    Err(DatabaseError::UnexpectedWrite {
        resource,
        operation,
        expected,
        actual,
    })
}

/// Represents a type that can fetch karaoke data from a database
#[async_trait]
pub trait Database: Send + Sync {
    /// Returns the session unless it doesn't exist or has expired
    async fn session_by_token(&self, token: &str) -> Result<SessionData>;

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData>;

    /// Every item queued in a room, in no particular order
    async fn queue_items(&self, room_id: PrimaryKey) -> Result<Vec<QueueItemData>>;
    async fn queue_item_by_id(
        &self,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<QueueItemData>;
    /// Returns the id of the user that queued the item, if the item exists
    async fn queue_item_owner(&self, queue_id: PrimaryKey) -> Result<Option<PrimaryKey>>;
    /// Links a new item after the current tail of the room's queue
    async fn append_queue_item(&self, new_item: NewQueueItem) -> Result<PrimaryKey>;
    /// Relinks an item so it comes right after `prev_queue_id`, or first if `None`
    async fn move_queue_item(&self, moved: MovedQueueItem) -> Result<()>;
    /// Unlinks and deletes an item. Deleting a missing item does nothing.
    async fn delete_queue_item(&self, room_id: PrimaryKey, queue_id: PrimaryKey) -> Result<()>;

    async fn youtube_video_by_id(&self, youtube_video_id: &str) -> Result<YoutubeVideoData>;
    /// Atomically creates a pending video row, replacing a failed one
    async fn resolve_youtube_video(&self, new_video: NewYoutubeVideo) -> Result<VideoResolution>;
    /// The oldest video still waiting to be processed
    async fn next_pending_youtube_video(&self) -> Result<Option<YoutubeVideoData>>;
    /// Puts videos stuck in processing back to pending. Returns how many were reset.
    async fn requeue_processing_youtube_videos(&self) -> Result<u64>;
    async fn update_youtube_video_status(
        &self,
        youtube_video_id: &str,
        status: YoutubeVideoStatus,
    ) -> Result<YoutubeVideoData>;
    /// The rooms with at least one queue item referencing the video
    async fn youtube_video_rooms(&self, youtube_video_id: &str) -> Result<Vec<PrimaryKey>>;
    /// Deletes the video if it is not pending and no queue item references it.
    /// Returns true if it was deleted.
    async fn delete_unreferenced_youtube_video(&self, youtube_video_id: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub song_id: Option<PrimaryKey>,
    pub youtube_video_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MovedQueueItem {
    pub room_id: PrimaryKey,
    pub queue_id: PrimaryKey,
    pub prev_queue_id: Option<PrimaryKey>,
}

#[derive(Debug, Clone)]
pub struct NewYoutubeVideo {
    pub youtube_video_id: String,
    /// The submitter
    pub user_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub duration: f32,
    pub thumbnail: String,
    pub url: String,
    pub lyrics: String,
    pub karaoke: bool,
}
