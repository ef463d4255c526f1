use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use crate::{
    expect_rows, Database, DatabaseError, MovedQueueItem, NewQueueItem, NewYoutubeVideo,
    PrimaryKey, QueueItemData, QueuedVideoData, Result, RoomData, RoomStatus, SessionData,
    UserData, VideoPlan, VideoResolution, YoutubeVideoData, YoutubeVideoStatus,
};

/// An in-memory database used in tests, following the same linking rules as postgres
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<UserData>,
    rooms: Vec<RoomData>,
    sessions: Vec<SessionData>,
    queue: Vec<QueueRow>,
    videos: Vec<YoutubeVideoData>,
    last_queue_id: PrimaryKey,
    /// Makes the next video delete affect no rows, like a concurrent delete would
    lose_next_video_delete: bool,
    /// Status writes into this status fail, like an unreachable database would
    failing_status: Option<YoutubeVideoStatus>,
}

#[derive(Debug, Clone)]
struct QueueRow {
    queue_id: PrimaryKey,
    room_id: PrimaryKey,
    user_id: PrimaryKey,
    prev_queue_id: Option<PrimaryKey>,
    song_id: Option<PrimaryKey>,
    youtube_video_id: Option<String>,
}

impl MemoryDatabase {
    pub fn add_user(&self, user: UserData) {
        self.state.lock().users.push(user);
    }

    pub fn add_room(&self, id: PrimaryKey, name: &str, password: Option<String>) {
        self.state.lock().rooms.push(RoomData {
            id,
            name: name.to_string(),
            status: RoomStatus::Open,
            password,
        });
    }

    pub fn close_room(&self, id: PrimaryKey) {
        let mut state = self.state.lock();

        if let Some(room) = state.rooms.iter_mut().find(|r| r.id == id) {
            room.status = RoomStatus::Closed;
        }
    }

    pub fn add_session(&self, token: &str, user_id: PrimaryKey, room_id: PrimaryKey) {
        let mut state = self.state.lock();
        let user = state
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .expect("session user exists");

        state.sessions.push(SessionData {
            token: token.to_string(),
            user,
            room_id,
            expires_at: Utc::now() + Duration::days(1),
        });
    }

    pub fn add_video(&self, video: YoutubeVideoData) {
        self.state.lock().videos.push(video);
    }

    pub fn fail_status_writes(&self, status: YoutubeVideoStatus) {
        self.state.lock().failing_status = Some(status);
    }

    pub fn videos(&self, youtube_video_id: &str) -> Vec<YoutubeVideoData> {
        self.state
            .lock()
            .videos
            .iter()
            .filter(|v| v.youtube_video_id == youtube_video_id)
            .cloned()
            .collect()
    }

    pub fn lose_next_video_delete(&self) {
        self.state.lock().lose_next_video_delete = true;
    }
}

impl MemoryState {
    fn to_item(&self, row: &QueueRow) -> QueueItemData {
        let user_display_name = self
            .users
            .iter()
            .find(|u| u.id == row.user_id)
            .map(|u| u.display_name.clone())
            .unwrap_or_default();

        let youtube_video = row.youtube_video_id.as_ref().and_then(|id| {
            self.videos
                .iter()
                .find(|v| &v.youtube_video_id == id)
                .map(|v| QueuedVideoData {
                    status: v.status,
                    title: v.title.clone(),
                    artist: v.artist.clone(),
                    duration: v.duration,
                    thumbnail: v.thumbnail.clone(),
                    karaoke: v.karaoke,
                })
        });

        QueueItemData {
            queue_id: row.queue_id,
            room_id: row.room_id,
            user_id: row.user_id,
            user_display_name,
            prev_queue_id: row.prev_queue_id,
            song_id: row.song_id,
            youtube_video_id: row.youtube_video_id.clone(),
            youtube_video,
        }
    }

    fn ensure_room(&self, room_id: PrimaryKey) -> Result<()> {
        self.rooms
            .iter()
            .any(|r| r.id == room_id)
            .then_some(())
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }

    fn link_of(&self, room_id: PrimaryKey, queue_id: PrimaryKey) -> Option<Option<PrimaryKey>> {
        self.queue
            .iter()
            .find(|q| q.queue_id == queue_id && q.room_id == room_id)
            .map(|q| q.prev_queue_id)
    }

    fn relink(
        &mut self,
        room_id: PrimaryKey,
        from: Option<PrimaryKey>,
        to: Option<PrimaryKey>,
        except: Option<PrimaryKey>,
    ) {
        self.queue
            .iter_mut()
            .filter(|q| q.room_id == room_id && q.prev_queue_id == from)
            .filter(|q| Some(q.queue_id) != except)
            .for_each(|q| q.prev_queue_id = to);
    }

    fn insert_video(&mut self, new_video: &NewYoutubeVideo) -> u64 {
        if self
            .videos
            .iter()
            .any(|v| v.youtube_video_id == new_video.youtube_video_id)
        {
            return 0;
        }

        self.videos.push(YoutubeVideoData {
            youtube_video_id: new_video.youtube_video_id.clone(),
            user_id: new_video.user_id,
            title: new_video.title.clone(),
            artist: new_video.artist.clone(),
            duration: new_video.duration,
            thumbnail: new_video.thumbnail.clone(),
            url: new_video.url.clone(),
            lyrics: new_video.lyrics.clone(),
            karaoke: new_video.karaoke,
            status: YoutubeVideoStatus::Pending,
            created_at: Utc::now(),
        });

        1
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > Utc::now())
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })
    }

    async fn queue_items(&self, room_id: PrimaryKey) -> Result<Vec<QueueItemData>> {
        let state = self.state.lock();

        Ok(state
            .queue
            .iter()
            .filter(|q| q.room_id == room_id)
            .map(|q| state.to_item(q))
            .collect())
    }

    async fn queue_item_by_id(
        &self,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<QueueItemData> {
        let state = self.state.lock();

        state
            .queue
            .iter()
            .find(|q| q.room_id == room_id && q.queue_id == queue_id)
            .map(|q| state.to_item(q))
            .ok_or(DatabaseError::NotFound {
                resource: "queue item",
                identifier: "queue_id",
            })
    }

    async fn queue_item_owner(&self, queue_id: PrimaryKey) -> Result<Option<PrimaryKey>> {
        Ok(self
            .state
            .lock()
            .queue
            .iter()
            .find(|q| q.queue_id == queue_id)
            .map(|q| q.user_id))
    }

    async fn append_queue_item(&self, new_item: NewQueueItem) -> Result<PrimaryKey> {
        let mut state = self.state.lock();
        state.ensure_room(new_item.room_id)?;

        let tail = state
            .queue
            .iter()
            .filter(|q| q.room_id == new_item.room_id)
            .filter(|q| {
                !state
                    .queue
                    .iter()
                    .any(|n| n.prev_queue_id == Some(q.queue_id))
            })
            .map(|q| q.queue_id)
            .max();

        state.last_queue_id += 1;
        let queue_id = state.last_queue_id;

        state.queue.push(QueueRow {
            queue_id,
            room_id: new_item.room_id,
            user_id: new_item.user_id,
            prev_queue_id: tail,
            song_id: new_item.song_id,
            youtube_video_id: new_item.youtube_video_id,
        });

        Ok(queue_id)
    }

    async fn move_queue_item(&self, moved: MovedQueueItem) -> Result<()> {
        let MovedQueueItem {
            room_id,
            queue_id,
            prev_queue_id,
        } = moved;

        if prev_queue_id == Some(queue_id) {
            return Ok(());
        }

        let mut state = self.state.lock();
        state.ensure_room(room_id)?;

        let Some(old_prev) = state.link_of(room_id, queue_id) else {
            return Ok(());
        };

        if let Some(prev) = prev_queue_id {
            state
                .link_of(room_id, prev)
                .ok_or(DatabaseError::NotFound {
                    resource: "queue item",
                    identifier: "prev_queue_id",
                })?;
        }

        state.relink(room_id, Some(queue_id), old_prev, None);
        state.relink(room_id, prev_queue_id, Some(queue_id), Some(queue_id));

        if let Some(row) = state.queue.iter_mut().find(|q| q.queue_id == queue_id) {
            row.prev_queue_id = prev_queue_id;
        }

        Ok(())
    }

    async fn delete_queue_item(&self, room_id: PrimaryKey, queue_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_room(room_id)?;

        let Some(prev) = state.link_of(room_id, queue_id) else {
            return Ok(());
        };

        state.relink(room_id, Some(queue_id), prev, None);
        state.queue.retain(|q| q.queue_id != queue_id);

        Ok(())
    }

    async fn youtube_video_by_id(&self, youtube_video_id: &str) -> Result<YoutubeVideoData> {
        self.state
            .lock()
            .videos
            .iter()
            .find(|v| v.youtube_video_id == youtube_video_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "youtube video",
                identifier: "youtube_video_id",
            })
    }

    async fn resolve_youtube_video(&self, new_video: NewYoutubeVideo) -> Result<VideoResolution> {
        let mut state = self.state.lock();

        let existing = state
            .videos
            .iter()
            .find(|v| v.youtube_video_id == new_video.youtube_video_id)
            .cloned();

        match VideoPlan::for_existing(existing.as_ref()) {
            VideoPlan::Keep(status) => Ok(VideoResolution::Existing(status)),
            VideoPlan::Replace => {
                let deleted = if std::mem::take(&mut state.lose_next_video_delete) {
                    0
                } else {
                    let before = state.videos.len();
                    state
                        .videos
                        .retain(|v| v.youtube_video_id != new_video.youtube_video_id);
                    (before - state.videos.len()) as u64
                };

                expect_rows("youtube video", "delete", 1, deleted)?;
                expect_rows("youtube video", "insert", 1, state.insert_video(&new_video))?;

                Ok(VideoResolution::Recreated)
            }
            VideoPlan::Insert => {
                expect_rows("youtube video", "insert", 1, state.insert_video(&new_video))?;

                Ok(VideoResolution::Created)
            }
        }
    }

    async fn next_pending_youtube_video(&self) -> Result<Option<YoutubeVideoData>> {
        Ok(self
            .state
            .lock()
            .videos
            .iter()
            .filter(|v| v.status == YoutubeVideoStatus::Pending)
            .min_by_key(|v| v.created_at)
            .cloned())
    }

    async fn requeue_processing_youtube_videos(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let mut count = 0;

        for video in state
            .videos
            .iter_mut()
            .filter(|v| v.status == YoutubeVideoStatus::Processing)
        {
            video.status = YoutubeVideoStatus::Pending;
            count += 1;
        }

        Ok(count)
    }

    async fn update_youtube_video_status(
        &self,
        youtube_video_id: &str,
        status: YoutubeVideoStatus,
    ) -> Result<YoutubeVideoData> {
        let mut state = self.state.lock();

        if state.failing_status == Some(status) {
            return Err(DatabaseError::Internal(
                format!("could not write status {}", status).into(),
            ));
        }

        let video = state
            .videos
            .iter_mut()
            .find(|v| v.youtube_video_id == youtube_video_id)
            .ok_or(DatabaseError::NotFound {
                resource: "youtube video",
                identifier: "youtube_video_id",
            })?;

        video.status = status;

        Ok(video.clone())
    }

    async fn youtube_video_rooms(&self, youtube_video_id: &str) -> Result<Vec<PrimaryKey>> {
        let mut rooms: Vec<_> = self
            .state
            .lock()
            .queue
            .iter()
            .filter(|q| q.youtube_video_id.as_deref() == Some(youtube_video_id))
            .map(|q| q.room_id)
            .collect();

        rooms.sort_unstable();
        rooms.dedup();

        Ok(rooms)
    }

    async fn delete_unreferenced_youtube_video(&self, youtube_video_id: &str) -> Result<bool> {
        let mut state = self.state.lock();

        let referenced = state
            .queue
            .iter()
            .any(|q| q.youtube_video_id.as_deref() == Some(youtube_video_id));

        if referenced {
            return Ok(false);
        }

        let before = state.videos.len();
        state.videos.retain(|v| {
            v.youtube_video_id != youtube_video_id || v.status == YoutubeVideoStatus::Pending
        });

        Ok(state.videos.len() < before)
    }
}
