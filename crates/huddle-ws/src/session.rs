use huddle_models::{Identity, PeerInfo};

/// An authenticated signaling connection. The connection id doubles as the
/// socket id peers use to address negotiation messages.
pub struct Session {
    pub conn_id: String,
    pub identity: Identity,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self {
            conn_id: uuid::Uuid::new_v4().to_string(),
            identity,
        }
    }

    pub fn peer_info(&self) -> PeerInfo {
        PeerInfo {
            id: self.conn_id.clone(),
            username: self.identity.username.clone(),
            user_type: self.identity.user_type,
        }
    }
}
