use std::{env, path::PathBuf, str::FromStr};

use karaoke_server::DEFAULT_PORT;
use thiserror::Error;

const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
const DEFAULT_MEDIA_DIR: &str = "./media";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Settings read from the environment at startup
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub ytdlp_path: String,
    pub media_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("KARAOKE_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or(ConfigError::Missing("KARAOKE_DATABASE_URL"))?;

        Ok(Self {
            database_url,
            database_max_connections: parsed(
                &lookup,
                "KARAOKE_DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            server_port: parsed(&lookup, "KARAOKE_SERVER_PORT", DEFAULT_PORT)?,
            ytdlp_path: lookup("KARAOKE_YTDLP_PATH").unwrap_or(DEFAULT_YTDLP_PATH.to_string()),
            media_dir: lookup("KARAOKE_MEDIA_DIR")
                .unwrap_or(DEFAULT_MEDIA_DIR.to_string())
                .into(),
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
