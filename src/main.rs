use std::sync::Arc;

use colored::{Color, Colorize};
use config::{Config, ConfigError};
use karaoke_collab::{
    ArcedDatabase, Collab, DatabaseError, PgDatabase, ProcessorTrigger, YtDlpConfig,
    YtDlpProcessor,
};
use log::{error, info};
use thiserror::Error;

mod config;
mod logging;

#[derive(Debug, Error)]
enum KaraokeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),
}

impl KaraokeError {
    fn hint(&self) -> String {
        match self {
            KaraokeError::Config(_) => "Check the KARAOKE_* environment variables. KARAOKE_DATABASE_URL (or DATABASE_URL) is required.".to_string(),
            KaraokeError::Database(_) => "This is a database error. Make sure the PostgreSQL instance is running and reachable with the configured URL, then try again.".to_string(),
            KaraokeError::Server(_) => "Make sure the configured port is free, or pick another with KARAOKE_SERVER_PORT.".to_string(),
        }
    }
}

async fn run() -> Result<(), KaraokeError> {
    let config = Config::from_env()?;

    info!("Connecting to database...");
    let database: ArcedDatabase = Arc::new(
        PgDatabase::new(&config.database_url, config.database_max_connections).await?,
    );

    let processor = YtDlpProcessor::new(YtDlpConfig {
        executable: config.ytdlp_path.clone(),
        media_dir: config.media_dir.clone(),
    });

    let collab = Arc::new(Collab::new(database, processor));

    // Picks up videos left pending or interrupted by a previous run
    collab.youtube.start_youtube_processor();

    info!("Initialized successfully.");
    karaoke_server::run_server(collab, config.server_port).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", e);
    }

    if let Err(error) = run().await {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "karaoke failed to start!".bold().color(Color::Red));
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint())
                .color(Color::BrightBlack)
                .italic()
        );
    }
}
