use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::UserType;

// Error codes surfaced on the real-time channel.
pub const CODE_AUTH_FAILED: &str = "AUTH_FAILED";
pub const CODE_ROOM_NOT_FOUND: &str = "ROOM_NOT_FOUND";
pub const CODE_JOIN_ROOM_ERROR: &str = "JOIN_ROOM_ERROR";
pub const CODE_RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

/// Frames sent by the client over the signaling channel.
///
/// The first frame on every connection must be `auth`; everything else is
/// rejected until the connection is authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "auth")]
    Auth(AuthPayload),
    #[serde(rename = "join")]
    Join(JoinPayload),
    #[serde(rename = "message")]
    Message(ChatPayload),
    #[serde(rename = "offer")]
    Offer(OfferPayload),
    #[serde(rename = "answer")]
    Answer(AnswerPayload),
    #[serde(rename = "ice-candidate")]
    IceCandidate(IceCandidatePayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub token: Option<String>,
    /// JSON-encoded guest session descriptor, as minted by the client.
    #[serde(default)]
    pub guest_session: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub room_id: String,
    #[serde(default)]
    pub room_name: Option<String>,
    pub user_id: String,
    pub username: String,
    pub user_type: UserType,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPayload {
    pub room: String,
    pub message: String,
    /// Client-asserted username; ignored when relaying in favor of the
    /// server-verified one.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPayload {
    pub offer: Value,
    pub to: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: Value,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidatePayload {
    pub candidate: Value,
    pub to: String,
}

/// Frames sent by the server over the signaling channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "existing-users")]
    ExistingUsers(Vec<PeerInfo>),
    #[serde(rename = "user-joined")]
    UserJoined(PeerInfo),
    #[serde(rename = "user-left")]
    UserLeft(UserLeftPayload),
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(ReceiveMessagePayload),
    #[serde(rename = "offer")]
    Offer(RelayedOffer),
    #[serde(rename = "answer")]
    Answer(RelayedAnswer),
    #[serde(rename = "ice-candidate")]
    IceCandidate(RelayedIceCandidate),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub id: String,
    pub username: String,
    pub user_type: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftPayload {
    #[serde(rename = "socketID")]
    pub socket_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveMessagePayload {
    pub message: String,
    pub username: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedOffer {
    pub offer: Value,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedAnswer {
    pub answer: Value,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayedIceCandidate {
    pub candidate: Value,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>, code: &str) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            code: code.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_use_wire_names() {
        let frame = json!({
            "event": "join",
            "data": {
                "roomId": "r1",
                "roomName": "standup",
                "userId": "u1",
                "username": "ada",
                "userType": "registered",
                "token": "t"
            }
        });
        let parsed: ClientEvent = serde_json::from_value(frame).unwrap();
        match parsed {
            ClientEvent::Join(join) => {
                assert_eq!(join.room_id, "r1");
                assert_eq!(join.user_type, UserType::Registered);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let ice = json!({
            "event": "ice-candidate",
            "data": { "candidate": { "sdpMid": "0" }, "to": "peer-1" }
        });
        assert!(matches!(
            serde_json::from_value::<ClientEvent>(ice).unwrap(),
            ClientEvent::IceCandidate(_)
        ));
    }

    #[test]
    fn server_events_serialize_with_exact_names() {
        let left = ServerEvent::UserLeft(UserLeftPayload {
            socket_id: "abc".into(),
        });
        let v = serde_json::to_value(&left).unwrap();
        assert_eq!(v["event"], "user-left");
        assert_eq!(v["data"]["socketID"], "abc");

        let msg = ServerEvent::ReceiveMessage(ReceiveMessagePayload {
            message: "hi".into(),
            username: "ada".into(),
            id: "conn-1".into(),
        });
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["event"], "receiveMessage");

        let existing = ServerEvent::ExistingUsers(vec![PeerInfo {
            id: "c1".into(),
            username: "bo".into(),
            user_type: UserType::Guest,
        }]);
        let v = serde_json::to_value(&existing).unwrap();
        assert_eq!(v["event"], "existing-users");
        assert_eq!(v["data"][0]["userType"], "guest");
    }
}
