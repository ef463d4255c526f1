use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use log::info;
use tokio::{io::AsyncReadExt, process::Command};
use url::Url;

use crate::YoutubeVideoData;

use super::{ProcessorError, VideoProcessor};

const YT_UNAVAILABLE: &str = "Video unavailable. This video is not available";
const YT_NOT_FOUND: &str = "Video unavailable";
const YT_ID_ERROR: &str = "Incomplete YouTube ID";

const WATCH_URL: &str = "https://www.youtube.com/watch";

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Path or name of the yt-dlp executable
    pub executable: String,
    /// Where downloaded videos end up, named after their id
    pub media_dir: PathBuf,
}

/// Downloads videos with yt-dlp
pub struct YtDlpProcessor {
    config: YtDlpConfig,
}

impl YtDlpProcessor {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    fn output_template(&self, youtube_video_id: &str) -> PathBuf {
        self.config
            .media_dir
            .join(format!("{}.%(ext)s", youtube_video_id))
    }
}

#[async_trait]
impl VideoProcessor for YtDlpProcessor {
    async fn process(&self, video: &YoutubeVideoData) -> Result<(), ProcessorError> {
        let id = &video.youtube_video_id;
        let url = watch_url(id)?;

        tokio::fs::create_dir_all(&self.config.media_dir)
            .await
            .map_err(|e| ProcessorError::Other(e.to_string()))?;

        let mut child = Command::new(&self.config.executable)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("-f")
            .arg("bestvideo[height<=720]+bestaudio/best")
            .arg("-o")
            .arg(self.output_template(id))
            .args(["--", url.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessorError::Spawn(e.to_string()))?;

        let mut error_output = String::new();

        if let Some(mut stderr) = child.stderr.take() {
            stderr.read_to_string(&mut error_output).await.ok();
        }

        let exit = child
            .wait()
            .await
            .map_err(|e| ProcessorError::Other(e.to_string()))?;

        if !exit.success() {
            return Err(classify_failure(&error_output));
        }

        info!("Downloaded YouTube video {} to {:?}", id, self.config.media_dir);
        Ok(())
    }
}

fn watch_url(youtube_video_id: &str) -> Result<Url, ProcessorError> {
    Url::parse_with_params(WATCH_URL, &[("v", youtube_video_id)])
        .map_err(|e| ProcessorError::Invalid(e.to_string()))
}

/// Turns the stderr of a failed yt-dlp run into an error
fn classify_failure(error_output: &str) -> ProcessorError {
    if error_output.contains(YT_UNAVAILABLE) {
        return ProcessorError::Unavailable;
    }

    if error_output.contains(YT_NOT_FOUND) {
        return ProcessorError::NotFound;
    }

    if error_output.contains(YT_ID_ERROR) {
        return ProcessorError::Invalid("Incomplete YouTube ID".to_string());
    }

    ProcessorError::Other(error_output.trim().to_string())
}
