use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rate limited")]
    RateLimited,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string()),
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message, "message": message }))).into_response()
    }
}

impl From<huddle_db::DbError> for ApiError {
    fn from(e: huddle_db::DbError) -> Self {
        match e {
            huddle_db::DbError::NotFound => ApiError::NotFound,
            huddle_db::DbError::Sqlx(_) => ApiError::Internal(anyhow::anyhow!("database error")),
        }
    }
}

impl From<huddle_core::auth::AuthError> for ApiError {
    fn from(e: huddle_core::auth::AuthError) -> Self {
        use huddle_core::auth::AuthError;
        match e {
            AuthError::MissingCredentials
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::InvalidGuestSession => ApiError::Unauthorized,
            AuthError::Internal(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<huddle_core::registry::RegistryError> for ApiError {
    fn from(e: huddle_core::registry::RegistryError) -> Self {
        match e {
            huddle_core::registry::RegistryError::RoomNotFound => ApiError::NotFound,
            huddle_core::registry::RegistryError::Database(_) => {
                ApiError::Internal(anyhow::anyhow!("database error"))
            }
        }
    }
}
