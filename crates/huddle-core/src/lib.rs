pub mod auth;
pub mod cleanup;
pub mod connections;
pub mod identity;
pub mod registry;
pub mod sanitize;

use std::sync::Arc;

use huddle_db::DbPool;
use tokio::sync::Notify;

use connections::ConnectionMap;
use registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    /// Authoritative in-memory record of live rooms and their members.
    pub registry: Arc<RoomRegistry>,
    /// Socket-id addressed outbound channels for the signaling relay.
    pub connections: Arc<ConnectionMap>,
    pub shutdown: Arc<Notify>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    /// Public URL of the web client, used to build shareable room links.
    pub client_url: String,
}
