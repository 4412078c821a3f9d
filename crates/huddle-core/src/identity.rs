use huddle_db::DbPool;
use huddle_models::Identity;
use serde::Deserialize;

use crate::auth::{self, AuthError};

/// Credentials presented by a connection: a signed bearer token, a guest
/// session descriptor, or neither. Never both required.
#[derive(Debug, Default, Clone)]
pub struct Credentials {
    pub token: Option<String>,
    pub guest_session: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestDescriptor {
    #[serde(rename = "type")]
    kind: String,
    session_id: Option<String>,
    display_name: Option<String>,
}

/// Resolve connection credentials to the canonical identity triple, or
/// fail closed. The token path takes precedence when both are present.
/// Pure verification: no state is created or mutated here.
pub async fn resolve(
    db: &DbPool,
    jwt_secret: &str,
    credentials: &Credentials,
) -> Result<Identity, AuthError> {
    if let Some(token) = credentials.token.as_deref() {
        let claims = auth::validate_token(token, jwt_secret)?;
        let user = huddle_db::users::get_user_by_id(db, claims.sub)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;
        return Ok(Identity::registered(user.id, user.name));
    }

    if let Some(raw) = credentials.guest_session.as_deref() {
        return resolve_guest(raw);
    }

    Err(AuthError::MissingCredentials)
}

fn resolve_guest(raw: &str) -> Result<Identity, AuthError> {
    let descriptor: GuestDescriptor =
        serde_json::from_str(raw).map_err(|_| AuthError::InvalidGuestSession)?;
    if descriptor.kind != "guest" {
        return Err(AuthError::InvalidGuestSession);
    }
    let session_id = descriptor
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidGuestSession)?;
    let display_name = descriptor
        .display_name
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidGuestSession)?;
    Ok(Identity::guest(session_id, display_name))
}
