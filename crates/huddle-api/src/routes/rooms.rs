use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use huddle_core::AppState;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{AuthUser, Caller};

const MIN_ROOM_NAME_LEN: usize = 2;
const MAX_ROOM_NAME_LEN: usize = 100;
const DEFAULT_HISTORY_PAGE_SIZE: i64 = 10;
const MAX_HISTORY_PAGE_SIZE: i64 = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_name: String,
}

pub async fn create_room(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.room_name.trim();
    let len = name.chars().count();
    if !(MIN_ROOM_NAME_LEN..=MAX_ROOM_NAME_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "room name must be {MIN_ROOM_NAME_LEN}-{MAX_ROOM_NAME_LEN} characters"
        )));
    }

    let room_id = Uuid::new_v4().to_string();
    let room = state
        .registry
        .create_room(
            &room_id,
            name,
            &caller.identity.user_id,
            caller.identity.user_type,
        )
        .await?;

    let join_link = format!(
        "{}/room/{}",
        state.config.client_url.trim_end_matches('/'),
        room.room_id
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "roomId": room.room_id,
            "roomName": room.room_name,
            "joinLink": join_link,
            "ownerType": room.owner_type,
        })),
    ))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Meeting history for a registered account, most recent first, enriched
/// with the room's persisted active flag and its live participant count.
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_PAGE_SIZE)
        .clamp(1, MAX_HISTORY_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let rows = huddle_db::participation::list_participation(&state.db, user.user_id, limit, offset)
        .await?;
    let total = huddle_db::participation::count_participation(&state.db, user.user_id).await?;

    let mut rooms = Vec::with_capacity(rows.len());
    for row in rows {
        let is_active = huddle_db::rooms::get_room(&state.db, &row.room_id)
            .await?
            .map(|r| r.is_active)
            .unwrap_or(false);
        let participant_count = state.registry.participant_count(&row.room_id).await;
        rooms.push(json!({
            "roomId": row.room_id,
            "roomName": row.room_name,
            "role": row.role,
            "joinedAt": row.joined_at,
            "lastActive": row.last_active,
            "isActive": is_active,
            "participantCount": participant_count,
        }));
    }

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
    Ok(Json(json!({
        "rooms": rooms,
        "total": total,
        "page": page,
        "totalPages": total_pages,
    })))
}
