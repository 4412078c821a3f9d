use serde::{Deserialize, Serialize};

/// Kind of account behind a connection or room owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Guest,
    Registered,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Registered => "registered",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "guest" => Some(Self::Guest),
            "registered" => Some(Self::Registered),
            _ => None,
        }
    }
}

/// The canonical resolved identity used everywhere downstream of
/// authentication. Registered accounts carry their numeric account id
/// rendered as a string; guests carry their client-minted session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub user_type: UserType,
    pub username: String,
}

impl Identity {
    pub fn guest(session_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: session_id.into(),
            user_type: UserType::Guest,
            username: display_name.into(),
        }
    }

    pub fn registered(account_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id: account_id.to_string(),
            user_type: UserType::Registered,
            username: username.into(),
        }
    }

    /// Numeric account id for registered identities, `None` for guests.
    pub fn account_id(&self) -> Option<i64> {
        match self.user_type {
            UserType::Registered => self.user_id.parse().ok(),
            UserType::Guest => None,
        }
    }
}
