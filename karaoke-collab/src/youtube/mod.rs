use async_trait::async_trait;
use thiserror::Error;

use crate::YoutubeVideoData;

mod manager;
mod ytdlp;

pub use manager::*;
pub use ytdlp::*;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Video is unavailable")]
    Unavailable,

    #[error("Video was not found")]
    NotFound,

    #[error("Video id is invalid: {0}")]
    Invalid(String),

    #[error("Could not run the processor: {0}")]
    Spawn(String),

    #[error("{0}")]
    Other(String),
}

/// Something that turns a pending video into a playable one
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    async fn process(&self, video: &YoutubeVideoData) -> Result<(), ProcessorError>;
}

/// Makes sure pending videos get processed.
///
/// Starting is idempotent, calling it while a worker is running only wakes it up.
pub trait ProcessorTrigger: Send + Sync {
    fn start_youtube_processor(&self);
}
