use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use huddle_db::rooms::RoomRow;
use huddle_db::{DbError, DbPool};
use huddle_models::{Participant, RoomRole, RoomSnapshot, UserType};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::cleanup::CleanupScheduler;

/// How long an empty room stays live (and, for guest-created rooms,
/// persisted) before being reclaimed.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("room not found")]
    RoomNotFound,
    #[error(transparent)]
    Database(#[from] DbError),
}

struct LiveRoom {
    room_name: String,
    owner_id: String,
    owner_type: UserType,
    guest_created: bool,
    created_at: DateTime<Utc>,
    /// Insertion-ordered current membership, keyed by connection id.
    participants: Vec<Participant>,
}

impl LiveRoom {
    fn from_row(row: &RoomRow) -> Self {
        Self {
            room_name: row.room_name.clone(),
            owner_id: row.owner_id.clone(),
            owner_type: UserType::parse(&row.owner_type).unwrap_or(UserType::Guest),
            guest_created: row.guest_created,
            created_at: row.created_at,
            participants: Vec::new(),
        }
    }

    fn snapshot(&self, room_id: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: room_id.to_string(),
            room_name: self.room_name.clone(),
            owner_id: self.owner_id.clone(),
            owner_type: self.owner_type,
            guest_created: self.guest_created,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<String, LiveRoom>,
    /// connection id -> room id. Kept in lockstep with each room's
    /// participant list under the registry mutex.
    socket_index: HashMap<String, String>,
}

#[derive(Debug)]
pub struct JoinOutcome {
    pub room: RoomSnapshot,
    /// Membership snapshot taken in the same critical section as the
    /// join, including the joiner.
    pub participants: Vec<Participant>,
}

pub struct Vacated {
    pub room_id: String,
    pub participant: Participant,
}

/// The single source of truth for "who is in which room right now".
///
/// Mutating operations are serialized through one async mutex, so the
/// room-just-became-empty check and the cleanup timer arm/disarm are
/// atomic with respect to concurrent joins. Persistence writes issued
/// inside the critical section are bookkeeping: failures are logged and
/// never roll back the in-memory change.
pub struct RoomRegistry {
    db: DbPool,
    cleanup: CleanupScheduler,
    cleanup_delay: Duration,
    state: Mutex<RegistryState>,
}

impl RoomRegistry {
    pub fn new(db: DbPool, cleanup_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            db,
            cleanup: CleanupScheduler::new(),
            cleanup_delay,
            state: Mutex::new(RegistryState::default()),
        })
    }

    /// Register a new room, live and persisted. The caller supplies a
    /// collision-free room id; this fails only if persistence fails.
    pub async fn create_room(
        &self,
        room_id: &str,
        room_name: &str,
        owner_id: &str,
        owner_type: UserType,
    ) -> Result<RoomSnapshot, RegistryError> {
        let guest_created = owner_type == UserType::Guest;
        let row = huddle_db::rooms::create_room(
            &self.db,
            room_id,
            room_name,
            owner_id,
            owner_type.as_str(),
            guest_created,
        )
        .await?;

        let mut state = self.state.lock().await;
        let live = LiveRoom::from_row(&row);
        let snapshot = live.snapshot(room_id);
        state.rooms.insert(room_id.to_string(), live);
        drop(state);

        if owner_type == UserType::Registered {
            self.record_participation(owner_id, room_id, room_name, RoomRole::Owner)
                .await;
        }
        tracing::info!(room_id, owner_type = owner_type.as_str(), "room created");
        Ok(snapshot)
    }

    /// Join a connection to a room, rehydrating it from the store if it is
    /// not currently live. Disarms any pending cleanup for the room.
    pub async fn join_room(
        self: &Arc<Self>,
        conn_id: &str,
        room_id: &str,
        user_id: &str,
        username: &str,
        user_type: UserType,
    ) -> Result<JoinOutcome, RegistryError> {
        let mut state = self.state.lock().await;

        if !state.rooms.contains_key(room_id) {
            let row = huddle_db::rooms::get_room(&self.db, room_id)
                .await?
                .ok_or(RegistryError::RoomNotFound)?;
            if let Err(err) = huddle_db::rooms::set_active(&self.db, room_id, true).await {
                tracing::warn!(room_id, %err, "failed to re-activate room in store");
            }
            state.rooms.insert(room_id.to_string(), LiveRoom::from_row(&row));
            tracing::debug!(room_id, "room rehydrated from store");
        }

        self.cleanup.disarm(room_id);

        // A connection belongs to at most one room; switching rooms
        // implicitly vacates the previous one.
        if let Some(previous) = state
            .socket_index
            .insert(conn_id.to_string(), room_id.to_string())
        {
            if previous != room_id {
                self.detach_locked(&mut state, conn_id, &previous);
            }
        }

        let participant = Participant {
            conn_id: conn_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            user_type,
            joined_at: Utc::now(),
        };
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or(RegistryError::RoomNotFound)?;
        match room
            .participants
            .iter_mut()
            .find(|p| p.conn_id == conn_id)
        {
            Some(existing) => *existing = participant,
            None => room.participants.push(participant),
        }

        let outcome = JoinOutcome {
            room: room.snapshot(room_id),
            participants: room.participants.clone(),
        };

        drop(state);

        if let Err(err) =
            huddle_db::rooms::add_participant(&self.db, room_id, user_id, user_type.as_str()).await
        {
            tracing::warn!(room_id, user_id, %err, "failed to persist participation event");
        }
        if user_type == UserType::Registered {
            let role = if outcome.room.owner_id == user_id
                && outcome.room.owner_type == UserType::Registered
            {
                RoomRole::Owner
            } else {
                RoomRole::Participant
            };
            self.record_participation(user_id, room_id, &outcome.room.room_name, role)
                .await;
        }

        Ok(outcome)
    }

    /// Remove a connection from its room, if it is in one. Returns the
    /// vacated room and participant so the caller can notify peers; `None`
    /// means the connection never joined (not an error). Arms the cleanup
    /// timer when the room empties.
    pub async fn leave_room(self: &Arc<Self>, conn_id: &str) -> Option<Vacated> {
        let mut state = self.state.lock().await;
        let room_id = state.socket_index.remove(conn_id)?;
        let room = state.rooms.get_mut(&room_id)?;
        let position = room.participants.iter().position(|p| p.conn_id == conn_id)?;
        let participant = room.participants.remove(position);
        let now_empty = room.participants.is_empty();

        if let Err(err) =
            huddle_db::rooms::remove_participant(&self.db, &room_id, &participant.user_id).await
        {
            tracing::warn!(room_id, %err, "failed to persist departure event");
        }

        if now_empty {
            self.arm_cleanup(&room_id);
            tracing::debug!(room_id, delay_secs = self.cleanup_delay.as_secs(), "room empty, cleanup armed");
        }

        Some(Vacated {
            room_id,
            participant,
        })
    }

    /// History rows exist only for registered accounts. Best effort, like
    /// all persistence touched from membership paths.
    async fn record_participation(
        &self,
        user_id: &str,
        room_id: &str,
        room_name: &str,
        role: RoomRole,
    ) {
        let Ok(account_id) = user_id.parse::<i64>() else {
            tracing::warn!(user_id, "registered participant with non-numeric id");
            return;
        };
        if let Err(err) = huddle_db::participation::upsert_participation(
            &self.db,
            account_id,
            room_id,
            room_name,
            role.as_str(),
        )
        .await
        {
            tracing::warn!(room_id, user_id, %err, "failed to record participation history");
        }
    }

    /// Unlink a connection from a room it is no longer current in.
    fn detach_locked(self: &Arc<Self>, state: &mut RegistryState, conn_id: &str, room_id: &str) {
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.participants.retain(|p| p.conn_id != conn_id);
            if room.participants.is_empty() {
                self.arm_cleanup(room_id);
            }
        }
    }

    fn arm_cleanup(self: &Arc<Self>, room_id: &str) {
        let weak = Arc::downgrade(self);
        let id = room_id.to_string();
        self.cleanup.arm(room_id, self.cleanup_delay, async move {
            if let Some(registry) = weak.upgrade() {
                registry.expire_room(&id).await;
            }
        });
    }

    /// Cleanup-timer expiry: re-check emptiness (a join may have raced the
    /// timer), then drop the live room. Guest-created rooms are also
    /// deleted from the store; registered-owned rooms are only marked
    /// inactive so their history and rejoin capability survive.
    async fn expire_room(&self, room_id: &str) {
        let mut state = self.state.lock().await;
        let Some(room) = state.rooms.get(room_id) else {
            return;
        };
        if !room.participants.is_empty() {
            return;
        }
        let guest_created = room.guest_created;
        state.rooms.remove(room_id);

        if guest_created {
            match huddle_db::rooms::delete_room(&self.db, room_id).await {
                Ok(()) => tracing::info!(room_id, "guest room deleted after idle timeout"),
                Err(err) => tracing::warn!(room_id, %err, "failed to delete guest room from store"),
            }
        } else {
            if let Err(err) = huddle_db::rooms::set_active(&self.db, room_id, false).await {
                tracing::warn!(room_id, %err, "failed to mark room inactive in store");
            }
            tracing::info!(room_id, "room evicted from memory after idle timeout");
        }
    }

    /// Snapshot of a room's current membership in insertion order.
    pub async fn participants(&self, room_id: &str) -> Vec<Participant> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(|r| r.participants.clone())
            .unwrap_or_default()
    }

    pub async fn participant_count(&self, room_id: &str) -> usize {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(|r| r.participants.len())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, room_id: &str) -> bool {
        self.participant_count(room_id).await == 0
    }

    pub async fn is_live(&self, room_id: &str) -> bool {
        self.state.lock().await.rooms.contains_key(room_id)
    }

    pub async fn room_of(&self, conn_id: &str) -> Option<String> {
        self.state.lock().await.socket_index.get(conn_id).cloned()
    }

    pub fn cleanup_armed(&self, room_id: &str) -> bool {
        self.cleanup.is_armed(room_id)
    }

    pub fn db_handle(&self) -> &DbPool {
        &self.db
    }

    /// Test-oriented consistency probe: every socket-index entry must have
    /// a matching participant and vice versa.
    pub async fn indexes_consistent(&self) -> bool {
        let state = self.state.lock().await;
        let forward = state.socket_index.iter().all(|(conn_id, room_id)| {
            state
                .rooms
                .get(room_id)
                .is_some_and(|r| r.participants.iter().any(|p| &p.conn_id == conn_id))
        });
        let backward = state.rooms.iter().all(|(room_id, room)| {
            room.participants
                .iter()
                .all(|p| state.socket_index.get(&p.conn_id) == Some(room_id))
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> Arc<RoomRegistry> {
        let pool = huddle_db::create_pool("sqlite::memory:", 1)
            .await
            .expect("pool");
        huddle_db::run_migrations(&pool).await.expect("migrations");
        RoomRegistry::new(pool, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn join_requires_an_existing_room() {
        let registry = registry().await;
        let err = registry
            .join_room("c1", "missing", "u1", "ada", UserType::Guest)
            .await
            .expect_err("must fail");
        assert!(matches!(err, RegistryError::RoomNotFound));
    }

    #[tokio::test]
    async fn join_and_leave_keep_indexes_consistent() {
        let registry = registry().await;
        registry
            .create_room("r1", "standup", "g1", UserType::Guest)
            .await
            .expect("create");

        let first = registry
            .join_room("c1", "r1", "g1", "ada", UserType::Guest)
            .await
            .expect("join");
        assert_eq!(first.participants.len(), 1);

        let second = registry
            .join_room("c2", "r1", "g2", "bo", UserType::Guest)
            .await
            .expect("join");
        assert_eq!(second.participants.len(), 2);
        // Insertion order.
        assert_eq!(second.participants[0].conn_id, "c1");
        assert_eq!(second.participants[1].conn_id, "c2");
        assert!(registry.indexes_consistent().await);

        let vacated = registry.leave_room("c1").await.expect("vacated");
        assert_eq!(vacated.room_id, "r1");
        assert_eq!(vacated.participant.username, "ada");
        assert_eq!(registry.participant_count("r1").await, 1);
        assert!(!registry.cleanup_armed("r1"));
        assert!(registry.indexes_consistent().await);
    }

    #[tokio::test]
    async fn leave_without_join_is_a_noop() {
        let registry = registry().await;
        assert!(registry.leave_room("unknown").await.is_none());
    }

    #[tokio::test]
    async fn empty_guest_room_is_deleted_after_the_delay() {
        // Pool creation must happen on a running clock: sqlx's acquire
        // timeout fires spuriously under tokio's paused-clock auto-advance.
        let registry = registry().await;
        tokio::time::pause();
        registry
            .create_room("r1", "standup", "g1", UserType::Guest)
            .await
            .expect("create");
        registry
            .join_room("c1", "r1", "g1", "ada", UserType::Guest)
            .await
            .expect("join");
        registry.leave_room("c1").await.expect("vacated");
        assert!(registry.cleanup_armed("r1"));

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;

        assert!(!registry.is_live("r1").await);
        let row = huddle_db::rooms::get_room(registry.db_handle(), "r1")
            .await
            .expect("query");
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn registered_room_is_only_evicted_not_deleted() {
        let registry = registry().await;
        tokio::time::pause();
        registry
            .create_room("r1", "standup", "7", UserType::Registered)
            .await
            .expect("create");
        registry
            .join_room("c1", "r1", "7", "ada", UserType::Registered)
            .await
            .expect("join");
        registry.leave_room("c1").await.expect("vacated");

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;

        assert!(!registry.is_live("r1").await);
        let row = huddle_db::rooms::get_room(registry.db_handle(), "r1")
            .await
            .expect("query")
            .expect("row survives");
        assert!(!row.is_active);

        // Rejoin rehydrates and re-activates.
        let outcome = registry
            .join_room("c2", "r1", "7", "ada", UserType::Registered)
            .await
            .expect("rejoin");
        assert_eq!(outcome.room.room_name, "standup");
        let row = huddle_db::rooms::get_room(registry.db_handle(), "r1")
            .await
            .expect("query")
            .expect("row");
        assert!(row.is_active);
    }

    #[tokio::test]
    async fn rejoin_before_expiry_cancels_the_pending_deletion() {
        let registry = registry().await;
        tokio::time::pause();
        registry
            .create_room("r1", "standup", "g1", UserType::Guest)
            .await
            .expect("create");
        registry
            .join_room("c1", "r1", "g1", "ada", UserType::Guest)
            .await
            .expect("join");
        registry.leave_room("c1").await.expect("vacated");
        assert!(registry.cleanup_armed("r1"));

        tokio::time::sleep(Duration::from_secs(120)).await;
        registry
            .join_room("c2", "r1", "g1", "ada", UserType::Guest)
            .await
            .expect("rejoin");
        assert!(!registry.cleanup_armed("r1"));

        tokio::time::sleep(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;

        assert!(registry.is_live("r1").await);
        assert!(huddle_db::rooms::get_room(registry.db_handle(), "r1")
            .await
            .expect("query")
            .is_some());
    }

    #[tokio::test]
    async fn switching_rooms_vacates_the_previous_one() {
        let registry = registry().await;
        registry
            .create_room("r1", "one", "g1", UserType::Guest)
            .await
            .expect("create");
        registry
            .create_room("r2", "two", "g1", UserType::Guest)
            .await
            .expect("create");

        registry
            .join_room("c1", "r1", "g1", "ada", UserType::Guest)
            .await
            .expect("join");
        registry
            .join_room("c1", "r2", "g1", "ada", UserType::Guest)
            .await
            .expect("switch");

        assert_eq!(registry.participant_count("r1").await, 0);
        assert_eq!(registry.participant_count("r2").await, 1);
        assert_eq!(registry.room_of("c1").await.as_deref(), Some("r2"));
        assert!(registry.indexes_consistent().await);
    }
}
