use karaoke_collab::{AddToQueue, MoveInQueue, QueueAction, RemoveFromQueue};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Message is not valid JSON")]
    Malformed,
    #[error("Unknown message type {0}")]
    UnknownType(String),
    #[error("Payload is invalid")]
    InvalidPayload,
}

/// A message received over the gateway
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    /// Echoed back in the acknowledgement
    pub ack_id: Option<u64>,
    /// `QUEUE_ADD`, `QUEUE_MOVE` or `QUEUE_REMOVE`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Value,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToQueueSchema {
    pub song_id: Option<i32>,
    #[validate(length(equal = 11))]
    pub youtube_video_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub thumbnail: String,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub url: String,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub duration: f32,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub artist: String,
    #[serde(default)]
    #[validate(length(max = 512))]
    pub title: String,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub karaoke: bool,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveInQueueSchema {
    pub queue_id: i32,
    /// Omit or send null to move to the head of the queue
    #[serde(default)]
    pub prev_queue_id: Option<i32>,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromQueueSchema {
    pub queue_id: i32,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(text).map_err(|_| SchemaError::Malformed)
    }

    /// Turns the payload into the action named by the message type
    pub fn to_action(&self) -> Result<QueueAction, SchemaError> {
        match self.kind.as_str() {
            "QUEUE_ADD" => {
                let add: AddToQueueSchema = self.payload()?;

                Ok(QueueAction::Add(AddToQueue {
                    song_id: add.song_id,
                    youtube_video_id: add.youtube_video_id,
                    thumbnail: add.thumbnail,
                    url: add.url,
                    duration: add.duration,
                    artist: add.artist,
                    title: add.title,
                    lyrics: add.lyrics,
                    karaoke: add.karaoke,
                }))
            }
            "QUEUE_MOVE" => {
                let moved: MoveInQueueSchema = self.payload()?;

                Ok(QueueAction::Move(MoveInQueue {
                    queue_id: moved.queue_id,
                    prev_queue_id: moved.prev_queue_id,
                }))
            }
            "QUEUE_REMOVE" => {
                let remove: RemoveFromQueueSchema = self.payload()?;

                Ok(QueueAction::Remove(RemoveFromQueue {
                    queue_id: remove.queue_id,
                }))
            }
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }

    fn payload<T>(&self) -> Result<T, SchemaError>
    where
        T: DeserializeOwned + Validate,
    {
        let payload: T = serde_json::from_value(self.payload.clone())
            .map_err(|_| SchemaError::InvalidPayload)?;

        payload
            .validate()
            .map_err(|_| SchemaError::InvalidPayload)?;

        Ok(payload)
    }
}
