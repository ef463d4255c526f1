use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;

use crate::{
    Actor, CollabContext, CollabEvent, DatabaseError, Media, MovedQueueItem, NewQueueItem,
    NewYoutubeVideo, Notice, PrimaryKey, ProcessorTrigger, QueueItemData, RoomError, Rooms,
    ValidateOptions, VideoResolution, YOUTUBE_ID_REGEX,
};

const RETRY_FAILED_NOTICE: &str =
    "This video had already failed, and we couldn't retry it. Let your host know something's wrong.";

/// Members are already in the room, so the password isn't checked again
const MEMBER_VALIDATION: ValidateOptions = ValidateOptions {
    validate_password: false,
};

#[derive(Debug, Clone)]
pub enum QueueAction {
    Add(AddToQueue),
    Move(MoveInQueue),
    Remove(RemoveFromQueue),
}

#[derive(Debug, Clone, Default)]
pub struct AddToQueue {
    pub song_id: Option<PrimaryKey>,
    pub youtube_video_id: Option<String>,
    pub thumbnail: String,
    pub url: String,
    pub duration: f32,
    pub artist: String,
    pub title: String,
    pub lyrics: String,
    pub karaoke: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveInQueue {
    pub queue_id: PrimaryKey,
    /// `None` moves the item to the head of the queue
    pub prev_queue_id: Option<PrimaryKey>,
}

#[derive(Debug, Clone, Copy)]
pub struct RemoveFromQueue {
    pub queue_id: PrimaryKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueActionKind {
    Add,
    Move,
    Remove,
}

/// The answer to a single action, sent only to the connection that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    Success(QueueActionKind),
    Error {
        kind: QueueActionKind,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authorization(&'static str),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

/// Authorizes queue actions, applies them and tells the room about it
pub struct QueueDispatcher {
    context: CollabContext,
    rooms: Arc<Rooms>,
    media: Arc<Media>,
    youtube: Arc<dyn ProcessorTrigger>,
}

impl QueueAction {
    pub fn kind(&self) -> QueueActionKind {
        match self {
            Self::Add(_) => QueueActionKind::Add,
            Self::Move(_) => QueueActionKind::Move,
            Self::Remove(_) => QueueActionKind::Remove,
        }
    }
}

impl QueueActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "QUEUE_ADD",
            Self::Move => "QUEUE_MOVE",
            Self::Remove => "QUEUE_REMOVE",
        }
    }
}

impl Acknowledgement {
    pub fn kind(&self) -> QueueActionKind {
        match self {
            Self::Success(kind) => *kind,
            Self::Error { kind, .. } => *kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<DatabaseError> for QueueError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { .. } => Self::NotFound(error.to_string()),
            error => Self::Internal(error.to_string()),
        }
    }
}

impl From<RoomError> for QueueError {
    fn from(error: RoomError) -> Self {
        match error {
            RoomError::Db(e) => e.into(),
            RoomError::HashError(e) => Self::Internal(e),
            error => Self::Validation(error.to_string()),
        }
    }
}

impl QueueDispatcher {
    pub fn new(
        context: &CollabContext,
        rooms: &Arc<Rooms>,
        media: &Arc<Media>,
        youtube: Arc<dyn ProcessorTrigger>,
    ) -> Self {
        Self {
            context: context.clone(),
            rooms: rooms.clone(),
            media: media.clone(),
            youtube,
        }
    }

    /// Handles an action of a connected actor.
    ///
    /// `acknowledge` is called exactly once. A successful action is acknowledged
    /// before the new queue is broadcast to the room.
    pub async fn dispatch<F>(&self, actor: &Actor, action: QueueAction, acknowledge: F)
    where
        F: FnOnce(Acknowledgement) + Send,
    {
        let kind = action.kind();

        let result = match action {
            QueueAction::Add(add) => self.add(actor, add).await,
            QueueAction::Move(moved) => self.move_item(actor, moved).await,
            QueueAction::Remove(remove) => self.remove(actor, remove).await,
        };

        match result {
            Ok(()) => {
                acknowledge(Acknowledgement::Success(kind));
                self.context.broadcast_queue(actor.room_id).await;
            }
            Err(e) => {
                match &e {
                    QueueError::Internal(_) => error!(
                        "{} by user {} in room {} failed: {}",
                        kind.as_str(),
                        actor.user_id,
                        actor.room_id,
                        e
                    ),
                    _ => warn!(
                        "{} by user {} in room {} was rejected: {}",
                        kind.as_str(),
                        actor.user_id,
                        actor.room_id,
                        e
                    ),
                }

                acknowledge(Acknowledgement::Error {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }

    async fn add(&self, actor: &Actor, add: AddToQueue) -> Result<(), QueueError> {
        self.rooms
            .validate(actor.room_id, None, MEMBER_VALIDATION)
            .await?;

        check_item(&add)?;

        let queue_id = self
            .context
            .queue
            .add(NewQueueItem {
                room_id: actor.room_id,
                user_id: actor.user_id,
                song_id: add.song_id,
                youtube_video_id: add.youtube_video_id.clone(),
            })
            .await?;

        info!(
            "User {} queued item {} in room {}",
            actor.user_id, queue_id, actor.room_id
        );

        let Some(youtube_video_id) = add.youtube_video_id else {
            return Ok(());
        };

        let new_video = NewYoutubeVideo {
            youtube_video_id,
            user_id: actor.user_id,
            title: add.title,
            artist: add.artist,
            duration: add.duration,
            thumbnail: add.thumbnail,
            url: add.url,
            lyrics: add.lyrics,
            karaoke: add.karaoke,
        };

        match self.context.database.resolve_youtube_video(new_video).await {
            Ok(VideoResolution::Created | VideoResolution::Recreated) => {
                self.youtube.start_youtube_processor();
                Ok(())
            }
            Ok(VideoResolution::Existing(status)) => {
                self.notify(
                    actor,
                    Notice::info(format!("😎 This video is already {}!", status)),
                );
                Ok(())
            }
            Err(e @ DatabaseError::UnexpectedWrite {
                operation: "delete",
                ..
            }) => {
                self.notify(actor, Notice::error(RETRY_FAILED_NOTICE));
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn move_item(&self, actor: &Actor, moved: MoveInQueue) -> Result<(), QueueError> {
        self.rooms
            .validate(actor.room_id, None, MEMBER_VALIDATION)
            .await?;

        self.authorize(actor, moved.queue_id, "Cannot move another user's song")
            .await?;

        let item = self
            .context
            .queue
            .item(actor.room_id, moved.queue_id)
            .await?;

        let Some(item) = item else {
            return Ok(());
        };

        self.context
            .queue
            .move_item(MovedQueueItem {
                room_id: actor.room_id,
                queue_id: moved.queue_id,
                prev_queue_id: moved.prev_queue_id,
            })
            .await?;

        // The moved item still references its video, so this never deletes it
        self.reconcile(&item).await;
        Ok(())
    }

    async fn remove(&self, actor: &Actor, remove: RemoveFromQueue) -> Result<(), QueueError> {
        let item = self
            .context
            .queue
            .item(actor.room_id, remove.queue_id)
            .await?;

        let Some(item) = item else {
            return Ok(());
        };

        self.authorize(actor, item.queue_id, "Cannot remove another user's song")
            .await?;

        self.context
            .queue
            .remove(actor.room_id, remove.queue_id)
            .await?;

        self.reconcile(&item).await;
        Ok(())
    }

    /// Admins may touch any item, everyone else only their own
    async fn authorize(
        &self,
        actor: &Actor,
        queue_id: PrimaryKey,
        message: &'static str,
    ) -> Result<(), QueueError> {
        if actor.is_admin {
            return Ok(());
        }

        let is_owner = self
            .context
            .queue
            .is_owner(actor.user_id, queue_id)
            .await?;

        if !is_owner {
            return Err(QueueError::Authorization(message));
        }

        Ok(())
    }

    async fn reconcile(&self, item: &QueueItemData) {
        let Some(id) = &item.youtube_video_id else {
            return;
        };

        match self.context.database.youtube_video_by_id(id).await {
            Ok(video) => self.media.reconcile_youtube_video(&video).await,
            Err(DatabaseError::NotFound { .. }) => {}
            Err(e) => error!("Could not load YouTube video {} to reconcile: {}", id, e),
        }
    }

    fn notify(&self, actor: &Actor, notice: Notice) {
        self.context.emit(CollabEvent::Notice {
            connection_id: actor.connection_id,
            notice,
        });
    }
}

/// A new item needs exactly one source, and YouTube ids have a fixed shape
fn check_item(add: &AddToQueue) -> Result<(), QueueError> {
    match (&add.song_id, &add.youtube_video_id) {
        (Some(_), None) => Ok(()),
        (None, Some(id)) if YOUTUBE_ID_REGEX.is_match(id) => Ok(()),
        (None, Some(_)) => Err(QueueError::Validation(
            "Invalid YouTube video id".to_string(),
        )),
        _ => Err(QueueError::Validation(
            "Queue items need either a song or a YouTube video".to_string(),
        )),
    }
}
