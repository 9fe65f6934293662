//! Read-only HTTP API endpoints.
//!
//! Thin wrappers around the registry's query functions; nothing here
//! mutates room state.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

use super::state::AppState;
use crate::domain::RoomSnapshot;

/// Aggregate counters across all rooms.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub rooms: usize,
    pub participants: usize,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get active room and participant counts
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let rooms = state.registry.room_count().await;
    let participants = state.registry.participant_count().await;
    Json(StatsResponse {
        rooms,
        participants,
    })
}

/// Get a snapshot of one room by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, StatusCode> {
    match state.registry.room_info(&room_id).await {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(StatusCode::NOT_FOUND),
    }
}
