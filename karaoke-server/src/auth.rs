use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
};
use karaoke_collab::{PrimaryKey, SessionData};

use crate::ServerContext;

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Whether the session may see the given room
    pub fn can_access(&self, room_id: PrimaryKey) -> bool {
        self.0.room_id == room_id || self.0.user.is_admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let token = bearer_token(header)
            .ok_or((StatusCode::BAD_REQUEST, "Authorization must be Bearer"))?;

        let session = context
            .collab
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let parts: Vec<_> = header.split_ascii_whitespace().collect();

    match parts[..] {
        ["Bearer", token] => Some(token),
        _ => None,
    }
}
