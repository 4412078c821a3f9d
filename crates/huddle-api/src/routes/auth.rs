use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use huddle_core::{auth, AppState};
use huddle_db::users::UserRow;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;

const MAX_NAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest("invalid name".into()));
    }
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if huddle_db::users::get_user_by_email(&state.db, &email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let hash = auth::hash_password(&req.password)?;
    let user = huddle_db::users::create_user(&state.db, name, &email, &hash).await?;
    let token = auth::create_token(
        user.id,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )?;

    tracing::info!(user_id = user.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "token": token, "user": user_json(&user) })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&req.email)?;
    let user = huddle_db::users::get_user_by_email(&state.db, &email)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized);
    }
    let token = auth::create_token(
        user.id,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )?;
    Ok(Json(json!({ "token": token, "user": user_json(&user) })))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let row = huddle_db::users::get_user_by_id(&state.db, user.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(json!({ "user": user_json(&row) })))
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    Ok(email)
}

fn user_json(user: &UserRow) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "createdAt": user.created_at,
    })
}
