use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};

/// One meeting-history entry for a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParticipationRow {
    pub room_id: String,
    pub room_name: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Record (or refresh) an account's participation in a room. At most one
/// row exists per (account, room); repeated joins bump last_active and the
/// role is never downgraded from owner.
pub async fn upsert_participation(
    pool: &DbPool,
    user_id: i64,
    room_id: &str,
    room_name: &str,
    role: &str,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO room_participation (user_id, room_id, room_name, role, joined_at, last_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (user_id, room_id) DO UPDATE SET
             last_active = ?5,
             role = CASE WHEN room_participation.role = 'owner' THEN 'owner' ELSE ?4 END",
    )
    .bind(user_id)
    .bind(room_id)
    .bind(room_name)
    .bind(role)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_participation(
    pool: &DbPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ParticipationRow>, DbError> {
    let rows = sqlx::query_as::<_, ParticipationRow>(
        "SELECT room_id, room_name, role, joined_at, last_active
         FROM room_participation
         WHERE user_id = ?1
         ORDER BY last_active DESC
         LIMIT ?2 OFFSET ?3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_participation(pool: &DbPool, user_id: i64) -> Result<i64, DbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM room_participation WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
