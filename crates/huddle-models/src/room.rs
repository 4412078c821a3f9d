use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserType;

/// Immutable view of a room handed out by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub room_name: String,
    pub owner_id: String,
    pub owner_type: UserType,
    pub guest_created: bool,
    pub created_at: DateTime<Utc>,
}

/// A live participant, keyed by its connection id within a room.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub conn_id: String,
    pub user_id: String,
    pub username: String,
    pub user_type: UserType,
    pub joined_at: DateTime<Utc>,
}

/// Role recorded in a registered account's meeting history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomRole {
    Owner,
    Participant,
}

impl RoomRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Participant => "participant",
        }
    }
}
