use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use huddle_core::{connections::ConnectionMap, registry::RoomRegistry, AppConfig, AppState};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("huddle=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let config = config::Config::load(&args.config)?;

    ensure_database_dir(&config.database.url)?;
    let db = huddle_db::create_pool(&config.database.url, config.database.max_connections).await?;
    huddle_db::run_migrations(&db).await?;

    let shutdown = Arc::new(Notify::new());
    let state = AppState {
        db: db.clone(),
        config: AppConfig {
            jwt_secret: config.auth.jwt_secret.clone(),
            jwt_expiry_seconds: config.auth.jwt_expiry_seconds,
            client_url: config.client.url.clone(),
        },
        registry: RoomRegistry::new(
            db,
            Duration::from_secs(config.cleanup.empty_room_delay_seconds),
        ),
        connections: Arc::new(ConnectionMap::new()),
        shutdown: shutdown.clone(),
    };

    let app = huddle_api::build_router()
        .merge(huddle_ws::gateway_router())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %config.server.bind_address,
        database = %config.database.url,
        "huddle server listening"
    );

    let shutdown_signal = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down (ctrl-c)...");
            }
            _ = shutdown.notified() => {
                tracing::info!("Shutting down (requested)...");
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

/// SQLite creates its file on demand but not the directory above it.
fn ensure_database_dir(url: &str) -> Result<()> {
    let Some(raw) = url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = raw.trim_start_matches("//");
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
