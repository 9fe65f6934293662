//! In-memory room registry.
//!
//! Owns the mapping from room id to its participants and the reverse
//! mapping from transport connection id to membership. All membership
//! mutations go through this type; the maps themselves are never exposed.
//!
//! Every operation takes the single internal lock once, mutates, and
//! returns before any I/O, so each operation appears atomic to concurrent
//! event handlers and the two maps can never be observed out of sync.

use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::time::{now_utc_millis, timestamp_to_rfc3339},
    config::Config,
    domain::{
        JoinKind, JoinOutcome, Participant, ParticipantSummary, RoomSnapshot, SignalingError,
    },
};

/// Fallback label for participants that join without a display name.
const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

#[derive(Default)]
struct Inner {
    /// room_id -> (user_id -> Participant)
    rooms: HashMap<String, HashMap<String, Participant>>,
    /// connection_id -> (room_id, user_id); resolves "who just disconnected"
    connections: HashMap<Uuid, (String, String)>,
}

/// Registry of active call rooms and their participants.
pub struct RoomRegistry {
    max_participants_per_room: usize,
    inner: Mutex<Inner>,
}

impl RoomRegistry {
    /// Create an empty registry with the given per-room capacity.
    pub fn new(max_participants_per_room: usize) -> Self {
        Self {
            max_participants_per_room,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Create an empty registry from the environment-driven config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_participants_per_room)
    }

    /// Add a user to a room, or refresh their membership on reconnection.
    ///
    /// A rejoin for an existing `user_id` updates `connection_id` and
    /// `peer_id` in place and preserves mute/video state and `joined_at`.
    /// Capacity is checked only for new identities, so a reconnecting user
    /// always wins over a full room.
    pub async fn join(
        &self,
        room_id: &str,
        user_id: &str,
        peer_id: &str,
        display_name: &str,
        connection_id: Uuid,
    ) -> Result<JoinOutcome, SignalingError> {
        if room_id.is_empty() {
            return Err(SignalingError::InvalidPayload("roomId"));
        }
        if user_id.is_empty() {
            return Err(SignalingError::InvalidPayload("userId"));
        }
        if peer_id.is_empty() {
            return Err(SignalingError::InvalidPayload("peerId"));
        }

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let (kind, participant) = match inner
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.get_mut(user_id))
        {
            Some(existing) => {
                // Reconnection: overwrite the transport identifiers in place
                // so other participants never see a spurious leave/join.
                let previous_connection = existing.connection_id;
                existing.connection_id = connection_id;
                existing.peer_id = peer_id.to_string();
                if previous_connection != connection_id {
                    inner.connections.remove(&previous_connection);
                }
                (JoinKind::Reconnect, existing.clone())
            }
            None => {
                let room = inner.rooms.entry(room_id.to_string()).or_default();
                if room.len() >= self.max_participants_per_room {
                    // Lazily created room stays out of the registry.
                    if room.is_empty() {
                        inner.rooms.remove(room_id);
                    }
                    return Err(SignalingError::RoomFull {
                        room_id: room_id.to_string(),
                        capacity: self.max_participants_per_room,
                    });
                }
                let display_name = if display_name.is_empty() {
                    ANONYMOUS_DISPLAY_NAME.to_string()
                } else {
                    display_name.to_string()
                };
                let participant = Participant {
                    connection_id,
                    user_id: user_id.to_string(),
                    room_id: room_id.to_string(),
                    peer_id: peer_id.to_string(),
                    display_name,
                    is_muted: true,
                    is_video_enabled: false,
                    joined_at: now_utc_millis(),
                };
                room.insert(user_id.to_string(), participant.clone());
                (JoinKind::NewJoin, participant)
            }
        };

        inner
            .connections
            .insert(connection_id, (room_id.to_string(), user_id.to_string()));

        let others = collect_others(inner, room_id, user_id);
        Ok(JoinOutcome {
            kind,
            participant,
            others,
        })
    }

    /// Remove a user from a room, deleting the room if it becomes empty.
    ///
    /// Returns the removed participant's last-known state, or `None` if no
    /// such membership existed. Calling this twice for the same membership
    /// is a safe no-op, which is what makes the explicit-leave vs.
    /// transport-close race harmless.
    pub async fn leave(&self, room_id: &str, user_id: &str) -> Option<Participant> {
        let mut inner = self.inner.lock().await;

        let room = inner.rooms.get_mut(room_id)?;
        let participant = room.remove(user_id)?;
        if room.is_empty() {
            inner.rooms.remove(room_id);
        }
        inner.connections.remove(&participant.connection_id);

        Some(participant)
    }

    /// Translate a closed connection into the membership it represented.
    pub async fn resolve_connection(&self, connection_id: Uuid) -> Option<(String, String)> {
        let inner = self.inner.lock().await;
        inner.connections.get(&connection_id).cloned()
    }

    /// Update a participant's mute flag in place.
    ///
    /// Returns the updated participant, or `None` when the room or user does
    /// not exist. Status changes for an already-left user are not errors.
    pub async fn set_mute(
        &self,
        room_id: &str,
        user_id: &str,
        muted: bool,
    ) -> Option<Participant> {
        let mut inner = self.inner.lock().await;
        let participant = inner.rooms.get_mut(room_id)?.get_mut(user_id)?;
        participant.is_muted = muted;
        Some(participant.clone())
    }

    /// Update a participant's video flag in place. Same contract as
    /// [`set_mute`](Self::set_mute).
    pub async fn set_video(
        &self,
        room_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> Option<Participant> {
        let mut inner = self.inner.lock().await;
        let participant = inner.rooms.get_mut(room_id)?.get_mut(user_id)?;
        participant.is_video_enabled = enabled;
        Some(participant.clone())
    }

    /// Snapshot of every participant in a room except `exclude_user_id`,
    /// sorted by user id for deterministic peers-list responses.
    pub async fn list_others(&self, room_id: &str, exclude_user_id: &str) -> Vec<Participant> {
        let inner = self.inner.lock().await;
        collect_others(&inner, room_id, exclude_user_id)
    }

    /// Snapshot of every participant in a room, sorted by user id.
    pub async fn list_members(&self, room_id: &str) -> Vec<Participant> {
        let inner = self.inner.lock().await;
        collect_others(&inner, room_id, "")
    }

    /// Look up one participant by room and user id.
    pub async fn find_participant(&self, room_id: &str, user_id: &str) -> Option<Participant> {
        let inner = self.inner.lock().await;
        inner.rooms.get(room_id)?.get(user_id).cloned()
    }

    /// Whether a room currently exists (i.e. has at least one participant).
    pub async fn room_exists(&self, room_id: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.rooms.contains_key(room_id)
    }

    /// Number of active rooms.
    pub async fn room_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.rooms.len()
    }

    /// Total participants across all rooms.
    pub async fn participant_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.rooms.values().map(HashMap::len).sum()
    }

    /// Read-only snapshot of one room for the HTTP API.
    pub async fn room_info(&self, room_id: &str) -> Option<RoomSnapshot> {
        let inner = self.inner.lock().await;
        let room = inner.rooms.get(room_id)?;

        let mut participants: Vec<&Participant> = room.values().collect();
        participants.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        let created_at = room.values().map(|p| p.joined_at).min().unwrap_or_default();

        Some(RoomSnapshot {
            room_id: room_id.to_string(),
            participant_count: participants.len(),
            participants: participants
                .into_iter()
                .map(ParticipantSummary::from)
                .collect(),
            created_at: timestamp_to_rfc3339(created_at),
        })
    }
}

fn collect_others(inner: &Inner, room_id: &str, exclude_user_id: &str) -> Vec<Participant> {
    let mut participants: Vec<Participant> = inner
        .rooms
        .get(room_id)
        .map(|room| {
            room.values()
                .filter(|p| p.user_id != exclude_user_id)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    // Sort by user_id for consistent ordering
    participants.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    participants
}
