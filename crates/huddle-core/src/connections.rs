use std::collections::HashMap;

use huddle_models::gateway::ServerEvent;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

/// Outbound channels for every live signaling connection, keyed by
/// connection id. The relay addresses peers through this map; actual frame
/// writing happens in each connection's writer task.
#[derive(Default)]
pub struct ConnectionMap {
    senders: RwLock<HashMap<String, UnboundedSender<ServerEvent>>>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, conn_id: &str, sender: UnboundedSender<ServerEvent>) {
        self.senders
            .write()
            .await
            .insert(conn_id.to_string(), sender);
    }

    pub async fn unregister(&self, conn_id: &str) {
        self.senders.write().await.remove(conn_id);
    }

    /// Deliver an event to one connection. Returns false when the target
    /// is no longer connected; the caller drops the event in that case.
    pub async fn send_to(&self, conn_id: &str, event: ServerEvent) -> bool {
        let senders = self.senders.read().await;
        match senders.get(conn_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub async fn is_connected(&self, conn_id: &str) -> bool {
        self.senders.read().await.contains_key(conn_id)
    }
}
