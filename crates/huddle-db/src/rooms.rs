use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoomRow {
    pub room_id: String,
    pub room_name: String,
    pub owner_id: String,
    pub owner_type: String,
    pub guest_created: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

pub async fn create_room(
    pool: &DbPool,
    room_id: &str,
    room_name: &str,
    owner_id: &str,
    owner_type: &str,
    guest_created: bool,
) -> Result<RoomRow, DbError> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, RoomRow>(
        "INSERT INTO rooms (room_id, room_name, owner_id, owner_type, guest_created, is_active, created_at, last_active)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
         RETURNING room_id, room_name, owner_id, owner_type, guest_created, is_active, created_at, last_active",
    )
    .bind(room_id)
    .bind(room_name)
    .bind(owner_id)
    .bind(owner_type)
    .bind(guest_created)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_room(pool: &DbPool, room_id: &str) -> Result<Option<RoomRow>, DbError> {
    let row = sqlx::query_as::<_, RoomRow>(
        "SELECT room_id, room_name, owner_id, owner_type, guest_created, is_active, created_at, last_active
         FROM rooms WHERE room_id = ?1",
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn set_active(pool: &DbPool, room_id: &str, active: bool) -> Result<(), DbError> {
    sqlx::query("UPDATE rooms SET is_active = ?2, last_active = ?3 WHERE room_id = ?1")
        .bind(room_id)
        .bind(active)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_room(pool: &DbPool, room_id: &str) -> Result<(), DbError> {
    sqlx::query("DELETE FROM rooms WHERE room_id = ?1")
        .bind(room_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a participant joining. Idempotent per in-progress visit: if the
/// user already has an open row (left_at NULL) for this room, only the
/// room's last_active is refreshed.
pub async fn add_participant(
    pool: &DbPool,
    room_id: &str,
    user_id: &str,
    user_type: &str,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO room_participants (room_id, user_id, user_type, joined_at)
         SELECT ?1, ?2, ?3, ?4
         WHERE NOT EXISTS (
             SELECT 1 FROM room_participants
             WHERE room_id = ?1 AND user_id = ?2 AND left_at IS NULL
         )",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(user_type)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE rooms SET last_active = ?2 WHERE room_id = ?1")
        .bind(room_id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stamp the open visit for this user as departed.
pub async fn remove_participant(
    pool: &DbPool,
    room_id: &str,
    user_id: &str,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "UPDATE room_participants SET left_at = ?3
         WHERE room_id = ?1 AND user_id = ?2 AND left_at IS NULL",
    )
    .bind(room_id)
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE rooms SET last_active = ?2 WHERE room_id = ?1")
        .bind(room_id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}
