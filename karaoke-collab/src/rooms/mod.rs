mod connection;

use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{ArcedDatabase, DatabaseError, PrimaryKey, RoomData, RoomStatus};

pub use connection::*;

/// Validates rooms and resolves their broadcast channels
pub struct Rooms {
    database: ArcedDatabase,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Invalid Room")]
    InvalidRoom,
    #[error("Room is no longer open")]
    RoomClosed,
    #[error("Room password is required")]
    PasswordRequired,
    #[error("Incorrect room password")]
    IncorrectPassword,
    #[error("HashError: {0}")]
    HashError(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    /// Members that already joined don't need to supply the password again
    pub validate_password: bool,
}

impl Rooms {
    const CHANNEL_PREFIX: &'static str = "ROOM_ID_";

    pub fn new(database: &ArcedDatabase) -> Self {
        Self {
            database: database.clone(),
            argon: Argon2::default(),
        }
    }

    /// Ensures a room exists and is open, checking its password if asked to
    pub async fn validate(
        &self,
        room_id: PrimaryKey,
        password: Option<&str>,
        options: ValidateOptions,
    ) -> Result<RoomData, RoomError> {
        let room = self
            .database
            .room_by_id(room_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RoomError::InvalidRoom,
                e => RoomError::Db(e),
            })?;

        if room.status != RoomStatus::Open {
            return Err(RoomError::RoomClosed);
        }

        if !options.validate_password {
            return Ok(room);
        }

        if let Some(stored) = &room.password {
            let password = password
                .filter(|p| !p.is_empty())
                .ok_or(RoomError::PasswordRequired)?;

            let stored = PasswordHash::parse(stored, Encoding::default())
                .map_err(|e| RoomError::HashError(e.to_string()))?;

            self.argon
                .verify_password(password.as_bytes(), &stored)
                .map_err(|_| RoomError::IncorrectPassword)?;
        }

        Ok(room)
    }

    /// Hashes a room password for storage
    pub fn hash_password(&self, password: &str) -> Result<String, RoomError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| RoomError::HashError(e.to_string()))
    }

    /// The name of the channel every member connection of a room subscribes to
    pub fn channel(room_id: PrimaryKey) -> String {
        format!("{}{}", Self::CHANNEL_PREFIX, room_id)
    }
}
