//! Domain model for call rooms and their participants.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// One user's live membership record within a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    /// Current transport connection; replaced in place on reconnection.
    pub connection_id: Uuid,
    /// Stable identity, unique within a room.
    pub user_id: String,
    /// The room this participant belongs to.
    pub room_id: String,
    /// Address used by the media layer; client-supplied, may change on
    /// reconnection.
    pub peer_id: String,
    /// Human-readable label shown to other participants.
    pub display_name: String,
    /// Starts muted on first join (privacy default); only explicit
    /// mute/unmute events change it.
    pub is_muted: bool,
    /// Starts with video off on first join; only explicit video-on/video-off
    /// events change it.
    pub is_video_enabled: bool,
    /// Unix timestamp (UTC, milliseconds) of the first join; not updated on
    /// reconnection.
    pub joined_at: i64,
}

/// Whether a join created a new membership or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// First join for this (room, user) pair.
    NewJoin,
    /// Same user rejoined; connection and peer id were updated in place.
    Reconnect,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub kind: JoinKind,
    /// The joining participant as stored after the operation.
    pub participant: Participant,
    /// Snapshot of all *other* participants in the room, for delivery to the
    /// joining client.
    pub others: Vec<Participant>,
}

/// Read-only view of one room, for the HTTP API.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub participant_count: usize,
    pub participants: Vec<ParticipantSummary>,
    /// RFC 3339 timestamp of the earliest join still present in the room.
    pub created_at: String,
}

/// Participant fields exposed through the HTTP API.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub user_id: String,
    pub display_name: String,
    pub is_muted: bool,
    pub is_video_enabled: bool,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.clone(),
            display_name: participant.display_name.clone(),
            is_muted: participant.is_muted,
            is_video_enabled: participant.is_video_enabled,
        }
    }
}

/// Expected, recoverable client-facing failures.
///
/// Every variant maps to a stable machine-readable code that is part of the
/// wire protocol; clients branch on the code, the message is for humans.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    #[error("missing or empty required field '{0}'")]
    InvalidPayload(&'static str),

    #[error("room '{room_id}' is full (capacity {capacity})")]
    RoomFull { room_id: String, capacity: usize },

    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("user '{0}' not found in room")]
    UserNotFound(String),

    #[error("invalid signal: {0}")]
    InvalidSignal(&'static str),

    #[error("failed to process join: {0}")]
    JoinFailed(String),

    #[error("failed to process signal: {0}")]
    SignalFailed(String),
}

impl SignalingError {
    /// Stable machine-readable code carried on outbound `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::InvalidSignal(_) => "INVALID_SIGNAL",
            Self::JoinFailed(_) => "JOIN_ERROR",
            Self::SignalFailed(_) => "SIGNAL_ERROR",
        }
    }
}
