use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use huddle_core::{identity, AppState};
use huddle_models::Identity;

/// Extractor for endpoints that require a registered account.
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization header"))?;
        let claims = huddle_core::auth::validate_token(token, &state.config.jwt_secret)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Extractor for endpoints open to guests and registered users alike.
/// Accepts a bearer token or a guest descriptor in `x-guest-session`;
/// the token wins when both are present.
pub struct Caller {
    pub identity: Identity,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = identity::Credentials {
            token: bearer_token(parts).map(str::to_string),
            guest_session: parts
                .headers
                .get("x-guest-session")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        let identity = identity::resolve(&state.db, &state.config.jwt_secret, &credentials)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Missing or invalid credentials"))?;
        Ok(Caller { identity })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
