//! WebSocket connection handler.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Pump one WebSocket connection.
///
/// The transport supplies no identity, so each connection gets a fresh id
/// here; the client introduces itself with a `join` event once connected.
/// Whatever way the socket ends, cleanup runs exactly once: the sender is
/// unregistered and the relay translates the close into a leave.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::info!("Connection {} established", connection_id);

    // Channel carrying serialized events from the sink to this socket
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.sink.register_connection(connection_id, tx).await;

    let (mut sender, mut receiver) = socket.split();

    // Task feeding inbound frames to the relay
    let relay = state.relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    relay.handle_text(connection_id, &text).await;
                }
                Message::Close(_) => {
                    tracing::info!("Connection {} requested close", connection_id);
                    break;
                }
                // Ping/pong is handled by the protocol layer; binary frames
                // are not part of the signaling protocol.
                _ => {}
            }
        }
    });

    // Task pushing outbound events to this socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // If either task completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.sink.unregister_connection(connection_id).await;
    state.relay.handle_disconnect(connection_id).await;
    tracing::info!("Connection {} cleaned up", connection_id);
}
