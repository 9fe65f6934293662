//! Wire protocol for the signaling WebSocket.
//!
//! Every frame is a JSON object with a `type` tag; the tag strings and field
//! names below are part of the external protocol and must not change.
//! Signal payloads carry a client-chosen `type` of `offer`, `answer`, or
//! `ice-candidate`; the server relays them opaquely and never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Participant, SignalingError};

/// Events received from clients.
///
/// Scalar fields default to the empty string when missing so that payload
/// validation can report a typed `INVALID_PAYLOAD` / `INVALID_SIGNAL` error
/// instead of a bare deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        peer_id: String,
        #[serde(default)]
        display_name: String,
    },
    Leave {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
    Signal {
        room_id: Option<String>,
        from_user_id: Option<String>,
        to_user_id: Option<String>,
        signal: Option<Value>,
    },
    Mute {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
    Unmute {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
    VideoOn {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
    VideoOff {
        #[serde(default)]
        room_id: String,
        #[serde(default)]
        user_id: String,
    },
}

/// Events sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Current members of the room, delivered to a client right after join.
    PeersList { peers: Vec<PeerInfo> },
    /// A new participant entered the room.
    PeerJoined {
        user_id: String,
        peer_id: String,
        display_name: String,
        is_muted: bool,
        is_video_enabled: bool,
    },
    /// A participant left the room (explicit leave or dropped connection).
    PeerLeft { user_id: String, peer_id: String },
    /// Level-triggered mute state for one participant.
    MuteStatus { user_id: String, is_muted: bool },
    /// Level-triggered camera state for one participant.
    VideoStatus {
        user_id: String,
        is_video_enabled: bool,
    },
    /// An opaque signaling payload forwarded from one peer to another.
    Signal {
        from_user_id: String,
        from_peer_id: String,
        to_user_id: String,
        signal: Value,
    },
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Build the `error` event for a client-facing failure.
    pub fn from_error(error: &SignalingError) -> Self {
        Self::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Participant fields shared with other clients over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub user_id: String,
    pub peer_id: String,
    pub display_name: String,
    pub is_muted: bool,
    pub is_video_enabled: bool,
}

impl From<&Participant> for PeerInfo {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.clone(),
            peer_id: participant.peer_id.clone(),
            display_name: participant.display_name.clone(),
            is_muted: participant.is_muted,
            is_video_enabled: participant.is_video_enabled,
        }
    }
}
