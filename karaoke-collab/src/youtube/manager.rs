use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::{sync::Notify, task::JoinHandle};

use crate::{CollabContext, Media, YoutubeVideoData, YoutubeVideoStatus};

use super::{ProcessorTrigger, VideoProcessor};

/// Owns the single worker that processes pending YouTube videos
pub struct YoutubeProcessManager {
    context: CollabContext,
    media: Arc<Media>,
    processor: Arc<dyn VideoProcessor>,
    wake: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
    spawn_count: AtomicUsize,
}

struct Worker {
    context: CollabContext,
    media: Arc<Media>,
    processor: Arc<dyn VideoProcessor>,
    wake: Arc<Notify>,
}

impl YoutubeProcessManager {
    pub fn new(
        context: &CollabContext,
        media: &Arc<Media>,
        processor: Arc<dyn VideoProcessor>,
    ) -> Self {
        Self {
            context: context.clone(),
            media: media.clone(),
            processor,
            wake: Arc::new(Notify::new()),
            worker: Mutex::new(None),
            spawn_count: AtomicUsize::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// How many times a worker had to be spawned
    pub fn spawn_count(&self) -> usize {
        self.spawn_count.load(Ordering::SeqCst)
    }
}

impl ProcessorTrigger for YoutubeProcessManager {
    fn start_youtube_processor(&self) {
        let mut worker = self.worker.lock();
        let running = worker.as_ref().is_some_and(|handle| !handle.is_finished());

        if !running {
            let new_worker = Worker {
                context: self.context.clone(),
                media: self.media.clone(),
                processor: self.processor.clone(),
                wake: self.wake.clone(),
            };

            *worker = Some(tokio::spawn(new_worker.run()));
            self.spawn_count.fetch_add(1, Ordering::SeqCst);

            info!("Started YouTube video processor");
        }

        // Stores a permit if the worker is busy, so the wakeup is never lost
        self.wake.notify_one();
    }
}

impl Worker {
    async fn run(self) {
        // A previous worker may have stopped mid-download
        match self.context.database.requeue_processing_youtube_videos().await {
            Ok(0) => {}
            Ok(count) => info!("Requeued {} interrupted YouTube videos", count),
            Err(e) => error!("Could not requeue interrupted YouTube videos: {}", e),
        }

        loop {
            match self.context.database.next_pending_youtube_video().await {
                Ok(Some(video)) => {
                    if !self.process(video).await {
                        self.wake.notified().await;
                    }
                }
                Ok(None) => self.wake.notified().await,
                Err(e) => {
                    error!("Could not fetch pending YouTube videos: {}", e);
                    self.wake.notified().await;
                }
            }
        }
    }

    /// Returns false if the video is still pending, so fetching it again would spin
    async fn process(&self, video: YoutubeVideoData) -> bool {
        let id = video.youtube_video_id.clone();

        let Some(video) = self.set_status(&id, YoutubeVideoStatus::Processing).await else {
            // Failed videos are recreated by the next add
            return self.set_status(&id, YoutubeVideoStatus::Failed).await.is_some();
        };

        info!("Processing YouTube video {}", id);

        let status = match self.processor.process(&video).await {
            Ok(()) => YoutubeVideoStatus::Ready,
            Err(e) => {
                warn!("Failed to process YouTube video {}: {}", id, e);
                YoutubeVideoStatus::Failed
            }
        };

        // Left in processing on error, and requeued when a worker starts again
        self.set_status(&id, status).await;
        true
    }

    async fn set_status(&self, id: &str, status: YoutubeVideoStatus) -> Option<YoutubeVideoData> {
        match self
            .context
            .database
            .update_youtube_video_status(id, status)
            .await
        {
            Ok(video) => {
                self.media.publish_youtube_video(&video).await;
                Some(video)
            }
            Err(e) => {
                error!("Could not mark YouTube video {} as {}: {}", id, status, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use crossbeam::channel::unbounded;

    use super::*;
    use crate::{
        ArcedDatabase, CollabEvent, EventReceiver, MemoryDatabase, NewQueueItem, ProcessorError,
        UserData,
    };

    /// Fails every video whose id starts with "x"
    #[derive(Default)]
    struct FakeProcessor {
        processed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VideoProcessor for FakeProcessor {
        async fn process(&self, video: &YoutubeVideoData) -> Result<(), ProcessorError> {
            self.processed.lock().push(video.youtube_video_id.clone());

            if video.youtube_video_id.starts_with('x') {
                return Err(ProcessorError::NotFound);
            }

            Ok(())
        }
    }

    fn pending(id: &str, age: i64) -> YoutubeVideoData {
        YoutubeVideoData {
            youtube_video_id: id.to_string(),
            user_id: 1,
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            duration: 180.,
            thumbnail: String::new(),
            url: String::new(),
            lyrics: String::new(),
            karaoke: false,
            status: YoutubeVideoStatus::Pending,
            created_at: Utc::now() - chrono::Duration::seconds(age),
        }
    }

    fn setup() -> (
        Arc<MemoryDatabase>,
        Arc<FakeProcessor>,
        YoutubeProcessManager,
        EventReceiver,
    ) {
        let db = Arc::new(MemoryDatabase::default());
        db.add_user(UserData::mock(1, "Ann"));
        db.add_room(1, "R1", None);

        let database: ArcedDatabase = db.clone();
        let (sender, receiver) = unbounded();
        let context = CollabContext::new(database, sender);
        let media = Arc::new(Media::new(&context));
        let processor = Arc::new(FakeProcessor::default());

        let manager = YoutubeProcessManager::new(&context, &media, processor.clone());

        (db, processor, manager, receiver)
    }

    async fn wait_for(db: &MemoryDatabase, id: &str, status: YoutubeVideoStatus) {
        for _ in 0..200 {
            if db.videos(id).first().map(|v| v.status) == Some(status) {
                return;
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        panic!("{} never became {}", id, status);
    }

    #[tokio::test]
    async fn starting_twice_spawns_one_worker() {
        let (_db, _processor, manager, _events) = setup();

        manager.start_youtube_processor();
        manager.start_youtube_processor();

        assert_eq!(manager.spawn_count(), 1);
        assert!(manager.is_running());
    }

    #[tokio::test]
    async fn interrupted_videos_are_processed_again() {
        let (db, processor, manager, _events) = setup();
        let mut video = pending("aaaaaaaaaaa", 0);
        video.status = YoutubeVideoStatus::Processing;
        db.add_video(video);

        manager.start_youtube_processor();

        wait_for(&db, "aaaaaaaaaaa", YoutubeVideoStatus::Ready).await;
        assert_eq!(*processor.processed.lock(), vec!["aaaaaaaaaaa"]);
    }

    #[tokio::test]
    async fn unmarkable_videos_do_not_stall_the_queue() {
        let (db, processor, manager, _events) = setup();
        db.fail_status_writes(YoutubeVideoStatus::Processing);
        db.add_video(pending("aaaaaaaaaaa", 20));
        db.add_video(pending("bbbbbbbbbbb", 10));

        manager.start_youtube_processor();

        wait_for(&db, "aaaaaaaaaaa", YoutubeVideoStatus::Failed).await;
        wait_for(&db, "bbbbbbbbbbb", YoutubeVideoStatus::Failed).await;
        assert!(processor.processed.lock().is_empty());
    }

    #[tokio::test]
    async fn pending_videos_are_processed_oldest_first() {
        let (db, processor, manager, _events) = setup();
        db.add_video(pending("bbbbbbbbbbb", 10));
        db.add_video(pending("aaaaaaaaaaa", 20));
        db.add_video(pending("xxxxxxxxxxx", 0));

        manager.start_youtube_processor();

        wait_for(&db, "aaaaaaaaaaa", YoutubeVideoStatus::Ready).await;
        wait_for(&db, "bbbbbbbbbbb", YoutubeVideoStatus::Ready).await;
        wait_for(&db, "xxxxxxxxxxx", YoutubeVideoStatus::Failed).await;

        assert_eq!(
            *processor.processed.lock(),
            vec!["aaaaaaaaaaa", "bbbbbbbbbbb", "xxxxxxxxxxx"]
        );
    }

    #[tokio::test]
    async fn idle_worker_is_woken_for_new_videos() {
        let (db, _processor, manager, events) = setup();

        manager.start_youtube_processor();
        tokio::time::sleep(Duration::from_millis(10)).await;

        db.add_video(pending("aaaaaaaaaaa", 0));
        manager
            .context
            .queue
            .add(NewQueueItem {
                room_id: 1,
                user_id: 1,
                song_id: None,
                youtube_video_id: Some("aaaaaaaaaaa".to_string()),
            })
            .await
            .unwrap();

        manager.start_youtube_processor();
        wait_for(&db, "aaaaaaaaaaa", YoutubeVideoStatus::Ready).await;

        assert_eq!(manager.spawn_count(), 1);

        // Processing, then ready
        tokio::time::sleep(Duration::from_millis(10)).await;
        let pushes = events
            .try_iter()
            .filter(|e| matches!(e, CollabEvent::QueuePush { room_id: 1, .. }))
            .count();
        assert_eq!(pushes, 2);
    }
}
