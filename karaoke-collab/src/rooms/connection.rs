use crate::{Id, PrimaryKey, SessionData};

pub type ConnectionId = Id<Actor>;

/// The identity an intent arrives with: a user's connection to a room
#[derive(Debug, Clone)]
pub struct Actor {
    pub connection_id: ConnectionId,
    pub user_id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub is_admin: bool,
}

impl Actor {
    /// Creates the actor for a new connection made with a session
    pub fn from_session(session: &SessionData) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            user_id: session.user.id,
            room_id: session.room_id,
            is_admin: session.user.is_admin,
        }
    }

    #[cfg(test)]
    pub fn mock(user_id: PrimaryKey, room_id: PrimaryKey) -> Self {
        Self {
            connection_id: ConnectionId::new(),
            user_id,
            room_id,
            is_admin: false,
        }
    }

    #[cfg(test)]
    pub fn mock_admin(user_id: PrimaryKey, room_id: PrimaryKey) -> Self {
        Self {
            is_admin: true,
            ..Self::mock(user_id, room_id)
        }
    }
}
