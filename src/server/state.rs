//! Shared application state.

use std::sync::Arc;

use crate::{registry::RoomRegistry, relay::SignalingRelay, server::sink::WebSocketEventSink};

/// State shared across all connection and HTTP handlers.
pub struct AppState {
    /// Membership registry, also queried by the read-only HTTP API.
    pub registry: Arc<RoomRegistry>,
    /// Event-handling logic shared by every connection.
    pub relay: Arc<SignalingRelay>,
    /// Outbound delivery map; connections register their sender here.
    pub sink: Arc<WebSocketEventSink>,
}

impl AppState {
    /// Wire up the registry, sink, and relay.
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        let sink = Arc::new(WebSocketEventSink::new());
        let relay = Arc::new(SignalingRelay::new(registry.clone(), sink.clone()));
        Self {
            registry,
            relay,
            sink,
        }
    }
}
