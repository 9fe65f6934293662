//! WebSocket implementation of the relay's outbound delivery seam.
//!
//! Socket creation lives in the connection handler; this type only manages
//! the per-connection sender channels and pushes serialized events onto
//! them. A dead or slow client is logged and skipped so one connection can
//! never stall a broadcast for the rest of a room.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::{protocol::ServerEvent, relay::EventSink};

/// Maps live connections to their outbound message channels.
pub struct WebSocketEventSink {
    connections: Mutex<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl WebSocketEventSink {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection's sender channel.
    pub async fn register_connection(
        &self,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut connections = self.connections.lock().await;
        connections.insert(connection_id, sender);
        tracing::debug!("Connection {} registered with sink", connection_id);
    }

    /// Drop a connection's sender channel.
    pub async fn unregister_connection(&self, connection_id: Uuid) {
        let mut connections = self.connections.lock().await;
        connections.remove(&connection_id);
        tracing::debug!("Connection {} unregistered from sink", connection_id);
    }
}

impl Default for WebSocketEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for WebSocketEventSink {
    async fn send(&self, connection_id: Uuid, event: ServerEvent) {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize outbound event: {}", e);
                return;
            }
        };

        let connections = self.connections.lock().await;
        match connections.get(&connection_id) {
            Some(sender) => {
                if sender.send(text).is_err() {
                    tracing::warn!(
                        "Failed to push event to connection {}, channel closed",
                        connection_id
                    );
                }
            }
            None => {
                tracing::debug!(
                    "Dropping event for unknown connection {}",
                    connection_id
                );
            }
        }
    }
}
