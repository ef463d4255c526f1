mod db;
mod events;
mod media;
mod queues;
mod rooms;
mod util;
mod youtube;

use std::sync::Arc;

use crossbeam::channel::unbounded;
use log::{error, warn};

pub use db::*;
pub use events::*;
pub use media::*;
pub use queues::*;
pub use rooms::*;
pub use util::*;
pub use youtube::*;

/// The karaoke collab system, facilitating rooms, queues, and video processing.
pub struct Collab {
    context: CollabContext,
    event_receiver: EventReceiver,

    pub rooms: Arc<Rooms>,
    pub dispatcher: QueueDispatcher,
    pub youtube: Arc<YoutubeProcessManager>,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: ArcedDatabase,
    pub queue: Arc<QueueStore>,

    event_sender: EventSender,
}

impl Collab {
    pub fn new<P>(database: ArcedDatabase, processor: P) -> Self
    where
        P: VideoProcessor + 'static,
    {
        let (event_sender, event_receiver) = unbounded();
        let context = CollabContext::new(database, event_sender);

        let rooms = Arc::new(Rooms::new(&context.database));
        let media = Arc::new(Media::new(&context));
        let youtube = Arc::new(YoutubeProcessManager::new(
            &context,
            &media,
            Arc::new(processor),
        ));

        let dispatcher = QueueDispatcher::new(&context, &rooms, &media, youtube.clone());

        Self {
            context,
            event_receiver,
            rooms,
            dispatcher,
            youtube,
        }
    }

    /// Blocks until the next event. Returns `None` once every sender is gone.
    pub fn wait_for_event(&self) -> Option<CollabEvent> {
        self.event_receiver.recv().ok()
    }

    pub async fn session(&self, token: &str) -> Result<SessionData> {
        self.context.database.session_by_token(token).await
    }

    pub fn queue(&self) -> &QueueStore {
        &self.context.queue
    }
}

impl CollabContext {
    pub fn new(database: ArcedDatabase, event_sender: EventSender) -> Self {
        Self {
            queue: Arc::new(QueueStore::new(&database)),
            database,
            event_sender,
        }
    }

    pub fn emit(&self, event: CollabEvent) {
        if self.event_sender.send(event).is_err() {
            warn!("Event was dropped because nothing is listening");
        }
    }

    /// Sends the room's current queue to everyone in the room
    pub async fn broadcast_queue(&self, room_id: PrimaryKey) {
        match self.queue.get(room_id).await {
            Ok(queue) => self.emit(CollabEvent::QueuePush {
                room_id,
                channel: Rooms::channel(room_id),
                queue,
            }),
            Err(e) => error!("Could not get queue of room {} to broadcast: {}", room_id, e),
        }
    }
}
