use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError, FromRow, PgPool,
    Postgres, Transaction,
};

use crate::{
    expect_rows, Database, DatabaseError, IntoDatabaseError, MovedQueueItem, NewQueueItem,
    NewYoutubeVideo, PrimaryKey, QueueItemData, QueuedVideoData, Result, RoomData, SessionData,
    UserData, VideoPlan, VideoResolution, YoutubeVideoData, YoutubeVideoStatus,
};

const QUEUE_ITEM_SELECT: &str = "
    SELECT
        queue.queue_id,
        queue.room_id,
        queue.user_id,
        queue.prev_queue_id,
        queue.song_id,
        queue.youtube_video_id,
        users.display_name AS user_display_name,
        videos.status AS video_status,
        videos.title AS video_title,
        videos.artist AS video_artist,
        videos.duration AS video_duration,
        videos.thumbnail AS video_thumbnail,
        videos.karaoke AS video_karaoke
    FROM queue
        INNER JOIN users ON queue.user_id = users.id
        LEFT JOIN youtube_videos AS videos ON queue.youtube_video_id = videos.youtube_video_id";

/// A postgres database implementation for karaoke
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    room_id: PrimaryKey,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    username: String,
    display_name: String,
    is_admin: bool,
}

#[derive(FromRow)]
struct RoomRow {
    id: PrimaryKey,
    name: String,
    status: String,
    password: Option<String>,
}

#[derive(FromRow)]
struct QueueItemRow {
    queue_id: PrimaryKey,
    room_id: PrimaryKey,
    user_id: PrimaryKey,
    prev_queue_id: Option<PrimaryKey>,
    song_id: Option<PrimaryKey>,
    youtube_video_id: Option<String>,
    user_display_name: String,
    video_status: Option<String>,
    video_title: Option<String>,
    video_artist: Option<String>,
    video_duration: Option<f32>,
    video_thumbnail: Option<String>,
    video_karaoke: Option<bool>,
}

#[derive(FromRow)]
struct YoutubeVideoRow {
    youtube_video_id: String,
    user_id: PrimaryKey,
    title: String,
    artist: String,
    duration: f32,
    thumbnail: String,
    url: String,
    lyrics: String,
    karaoke: bool,
    status: String,
    created_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    /// Locks the room row, serializing every queue mutation of that room
    async fn lock_room(tx: &mut Transaction<'_, Postgres>, room_id: PrimaryKey) -> Result<()> {
        query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
            .map(|_| ())
    }

    /// Returns `Some(prev_queue_id)` if the item exists in the room
    async fn link_of(
        tx: &mut Transaction<'_, Postgres>,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<Option<Option<PrimaryKey>>> {
        query_scalar("SELECT prev_queue_id FROM queue WHERE queue_id = $1 AND room_id = $2")
            .bind(queue_id)
            .bind(room_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| e.any())
    }

    async fn insert_youtube_video(
        tx: &mut Transaction<'_, Postgres>,
        new_video: &NewYoutubeVideo,
    ) -> Result<u64> {
        query(
            "
            INSERT INTO youtube_videos
                (youtube_video_id, user_id, thumbnail, url, duration, artist, title, lyrics, karaoke, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending')
            ON CONFLICT (youtube_video_id) DO NOTHING",
        )
        .bind(&new_video.youtube_video_id)
        .bind(new_video.user_id)
        .bind(&new_video.thumbnail)
        .bind(&new_video.url)
        .bind(new_video.duration)
        .bind(&new_video.artist)
        .bind(&new_video.title)
        .bind(&new_video.lyrics)
        .bind(new_video.karaoke)
        .execute(&mut **tx)
        .await
        .map_err(|e| e.any())
        .map(|r| r.rows_affected())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as(
            "
            SELECT
                sessions.token,
                sessions.room_id,
                sessions.expires_at,
                users.id AS user_id,
                users.username,
                users.display_name,
                users.is_admin
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            token: row.token,
            room_id: row.room_id,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                username: row.username,
                display_name: row.display_name,
                is_admin: row.is_admin,
            },
        })
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let row: RoomRow = query_as("SELECT id, name, status, password FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        Ok(RoomData {
            id: row.id,
            name: row.name,
            status: row.status.parse()?,
            password: row.password,
        })
    }

    async fn queue_items(&self, room_id: PrimaryKey) -> Result<Vec<QueueItemData>> {
        let rows: Vec<QueueItemRow> =
            query_as(&format!("{QUEUE_ITEM_SELECT} WHERE queue.room_id = $1"))
                .bind(room_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn queue_item_by_id(
        &self,
        room_id: PrimaryKey,
        queue_id: PrimaryKey,
    ) -> Result<QueueItemData> {
        let row: QueueItemRow = query_as(&format!(
            "{QUEUE_ITEM_SELECT} WHERE queue.room_id = $1 AND queue.queue_id = $2"
        ))
        .bind(room_id)
        .bind(queue_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("queue item", "queue_id"))?;

        row.try_into()
    }

    async fn queue_item_owner(&self, queue_id: PrimaryKey) -> Result<Option<PrimaryKey>> {
        query_scalar("SELECT user_id FROM queue WHERE queue_id = $1")
            .bind(queue_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn append_queue_item(&self, new_item: NewQueueItem) -> Result<PrimaryKey> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;
        Self::lock_room(&mut tx, new_item.room_id).await?;

        // The tail is the item nothing points at
        let tail: Option<PrimaryKey> = query_scalar(
            "
            SELECT MAX(item.queue_id) FROM queue AS item
            WHERE item.room_id = $1 AND NOT EXISTS (
                SELECT 1 FROM queue AS next
                WHERE next.prev_queue_id = item.queue_id AND next.room_id = $1
            )",
        )
        .bind(new_item.room_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let queue_id: PrimaryKey = query_scalar(
            "
            INSERT INTO queue (room_id, user_id, prev_queue_id, song_id, youtube_video_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING queue_id",
        )
        .bind(new_item.room_id)
        .bind(new_item.user_id)
        .bind(tail)
        .bind(new_item.song_id)
        .bind(&new_item.youtube_video_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

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

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;
        Self::lock_room(&mut tx, room_id).await?;

        let Some(old_prev) = Self::link_of(&mut tx, room_id, queue_id).await? else {
            return tx.commit().await.map_err(|e| e.any());
        };

        if let Some(prev) = prev_queue_id {
            Self::link_of(&mut tx, room_id, prev)
                .await?
                .ok_or(DatabaseError::NotFound {
                    resource: "queue item",
                    identifier: "prev_queue_id",
                })?;
        }

        // Close the gap left behind
        query("UPDATE queue SET prev_queue_id = $1 WHERE prev_queue_id = $2 AND room_id = $3")
            .bind(old_prev)
            .bind(queue_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        // Whoever followed the new predecessor now follows the moved item
        query(
            "
            UPDATE queue SET prev_queue_id = $1
            WHERE room_id = $2 AND prev_queue_id IS NOT DISTINCT FROM $3 AND queue_id <> $1",
        )
        .bind(queue_id)
        .bind(room_id)
        .bind(prev_queue_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        query("UPDATE queue SET prev_queue_id = $1 WHERE queue_id = $2")
            .bind(prev_queue_id)
            .bind(queue_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn delete_queue_item(&self, room_id: PrimaryKey, queue_id: PrimaryKey) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;
        Self::lock_room(&mut tx, room_id).await?;

        let Some(prev) = Self::link_of(&mut tx, room_id, queue_id).await? else {
            return tx.commit().await.map_err(|e| e.any());
        };

        query("UPDATE queue SET prev_queue_id = $1 WHERE prev_queue_id = $2 AND room_id = $3")
            .bind(prev)
            .bind(queue_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("DELETE FROM queue WHERE queue_id = $1")
            .bind(queue_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn youtube_video_by_id(&self, youtube_video_id: &str) -> Result<YoutubeVideoData> {
        let row: YoutubeVideoRow =
            query_as("SELECT * FROM youtube_videos WHERE youtube_video_id = $1")
                .bind(youtube_video_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.not_found_or("youtube video", "youtube_video_id"))?;

        row.try_into()
    }

    async fn resolve_youtube_video(&self, new_video: NewYoutubeVideo) -> Result<VideoResolution> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let existing: Option<YoutubeVideoRow> =
            query_as("SELECT * FROM youtube_videos WHERE youtube_video_id = $1 FOR UPDATE")
                .bind(&new_video.youtube_video_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| e.any())?;

        let existing: Option<YoutubeVideoData> = existing.map(TryInto::try_into).transpose()?;

        let resolution = match VideoPlan::for_existing(existing.as_ref()) {
            VideoPlan::Keep(status) => VideoResolution::Existing(status),
            VideoPlan::Replace => {
                let deleted = query("DELETE FROM youtube_videos WHERE youtube_video_id = $1")
                    .bind(&new_video.youtube_video_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| e.any())?
                    .rows_affected();

                expect_rows("youtube video", "delete", 1, deleted)?;

                let inserted = Self::insert_youtube_video(&mut tx, &new_video).await?;
                expect_rows("youtube video", "insert", 1, inserted)?;

                VideoResolution::Recreated
            }
            VideoPlan::Insert => match Self::insert_youtube_video(&mut tx, &new_video).await? {
                1 => VideoResolution::Created,
                // Another add inserted it between our lookup and insert
                0 => VideoResolution::Existing(YoutubeVideoStatus::Pending),
                inserted => expect_rows("youtube video", "insert", 1, inserted)
                    .map(|_| VideoResolution::Created)?,
            },
        };

        tx.commit().await.map_err(|e| e.any())?;

        Ok(resolution)
    }

    async fn next_pending_youtube_video(&self) -> Result<Option<YoutubeVideoData>> {
        let row: Option<YoutubeVideoRow> = query_as(
            "SELECT * FROM youtube_videos WHERE status = 'pending' ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.map(TryInto::try_into).transpose()
    }

    async fn requeue_processing_youtube_videos(&self) -> Result<u64> {
        query("UPDATE youtube_videos SET status = 'pending' WHERE status = 'processing'")
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| e.any())
    }

    async fn update_youtube_video_status(
        &self,
        youtube_video_id: &str,
        status: YoutubeVideoStatus,
    ) -> Result<YoutubeVideoData> {
        let row: YoutubeVideoRow = query_as(
            "UPDATE youtube_videos SET status = $1 WHERE youtube_video_id = $2 RETURNING *",
        )
        .bind(status.as_str())
        .bind(youtube_video_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("youtube video", "youtube_video_id"))?;

        row.try_into()
    }

    async fn youtube_video_rooms(&self, youtube_video_id: &str) -> Result<Vec<PrimaryKey>> {
        query_scalar("SELECT DISTINCT room_id FROM queue WHERE youtube_video_id = $1")
            .bind(youtube_video_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn delete_unreferenced_youtube_video(&self, youtube_video_id: &str) -> Result<bool> {
        let deleted = query(
            "
            DELETE FROM youtube_videos
            WHERE youtube_video_id = $1 AND status <> 'pending' AND NOT EXISTS (
                SELECT 1 FROM queue WHERE queue.youtube_video_id = $1
            )",
        )
        .bind(youtube_video_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?
        .rows_affected();

        Ok(deleted > 0)
    }
}

impl TryFrom<QueueItemRow> for QueueItemData {
    type Error = DatabaseError;

    fn try_from(row: QueueItemRow) -> Result<Self> {
        let youtube_video = match row.video_status {
            Some(status) => Some(QueuedVideoData {
                status: status.parse()?,
                title: row.video_title.unwrap_or_default(),
                artist: row.video_artist.unwrap_or_default(),
                duration: row.video_duration.unwrap_or_default(),
                thumbnail: row.video_thumbnail.unwrap_or_default(),
                karaoke: row.video_karaoke.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Self {
            queue_id: row.queue_id,
            room_id: row.room_id,
            user_id: row.user_id,
            user_display_name: row.user_display_name,
            prev_queue_id: row.prev_queue_id,
            song_id: row.song_id,
            youtube_video_id: row.youtube_video_id,
            youtube_video,
        })
    }
}

impl TryFrom<YoutubeVideoRow> for YoutubeVideoData {
    type Error = DatabaseError;

    fn try_from(row: YoutubeVideoRow) -> Result<Self> {
        Ok(Self {
            youtube_video_id: row.youtube_video_id,
            user_id: row.user_id,
            title: row.title,
            artist: row.artist,
            duration: row.duration,
            thumbnail: row.thumbnail,
            url: row.url,
            lyrics: row.lyrics,
            karaoke: row.karaoke,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
