use log::{error, info};

use crate::{CollabContext, YoutubeVideoData};

/// Keeps video rows in line with the queues referencing them
pub struct Media {
    context: CollabContext,
}

impl Media {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Deletes the video if it's done pending and no queue references it anymore
    pub async fn reconcile_youtube_video(&self, video: &YoutubeVideoData) {
        let id = &video.youtube_video_id;

        match self
            .context
            .database
            .delete_unreferenced_youtube_video(id)
            .await
        {
            Ok(true) => info!("YouTube video {} is no longer queued and was removed", id),
            Ok(false) => {}
            Err(e) => error!("Could not reconcile YouTube video {}: {}", id, e),
        }
    }

    /// Sends fresh queues to every room that has the video queued
    pub async fn publish_youtube_video(&self, video: &YoutubeVideoData) {
        let id = &video.youtube_video_id;

        let rooms = match self.context.database.youtube_video_rooms(id).await {
            Ok(rooms) => rooms,
            Err(e) => {
                error!("Could not find rooms queueing YouTube video {}: {}", id, e);
                return;
            }
        };

        for room_id in rooms {
            self.context.broadcast_queue(room_id).await;
        }
    }
}
