//! Stateless signaling relay.
//!
//! Validates inbound events, consults the [`RoomRegistry`], and decides
//! which connection(s) receive which outbound event. The relay itself holds
//! no state; everything it knows comes from the registry on each call.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
#[cfg(test)]
use mockall::automock;
use uuid::Uuid;

use crate::{
    domain::{JoinKind, SignalingError},
    protocol::{ClientEvent, PeerInfo, ServerEvent},
    registry::RoomRegistry,
};

/// Outbound delivery seam between the relay and the transport.
///
/// The WebSocket implementation serializes the event and pushes it onto the
/// target connection's channel; tests substitute a mock or a recorder.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event to one connection. Delivery failures are the
    /// implementation's problem (log and drop); the relay never blocks on a
    /// slow or dead client.
    async fn send(&self, connection_id: Uuid, event: ServerEvent);
}

/// Event-handling logic shared by every connection.
pub struct SignalingRelay {
    registry: Arc<RoomRegistry>,
    sink: Arc<dyn EventSink>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<RoomRegistry>, sink: Arc<dyn EventSink>) -> Self {
        Self { registry, sink }
    }

    /// Handle one raw text frame from a connection.
    ///
    /// Malformed JSON and typed failures become an `error` event back to the
    /// sender; a panic in a handler is caught here and converted to a
    /// generic error so one bad event cannot take the process down.
    pub async fn handle_text(&self, connection_id: Uuid, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Unparseable event on connection {}: {}", connection_id, e);
                let error = SignalingError::InvalidPayload("type");
                self.sink
                    .send(connection_id, ServerEvent::from_error(&error))
                    .await;
                return;
            }
        };

        let is_join = matches!(event, ClientEvent::Join { .. });
        let handled = std::panic::AssertUnwindSafe(self.handle_event(connection_id, event))
            .catch_unwind()
            .await;

        match handled {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!("Rejected event on connection {}: {}", connection_id, error);
                self.sink
                    .send(connection_id, ServerEvent::from_error(&error))
                    .await;
            }
            Err(_) => {
                tracing::error!("Event handler panicked on connection {}", connection_id);
                let error = if is_join {
                    SignalingError::JoinFailed("internal error".to_string())
                } else {
                    SignalingError::SignalFailed("internal error".to_string())
                };
                self.sink
                    .send(connection_id, ServerEvent::from_error(&error))
                    .await;
            }
        }
    }

    /// Dispatch one parsed event.
    pub async fn handle_event(
        &self,
        connection_id: Uuid,
        event: ClientEvent,
    ) -> Result<(), SignalingError> {
        match event {
            ClientEvent::Join {
                room_id,
                user_id,
                peer_id,
                display_name,
            } => {
                self.handle_join(connection_id, &room_id, &user_id, &peer_id, &display_name)
                    .await
            }
            ClientEvent::Leave { room_id, user_id } => {
                self.remove_participant(&room_id, &user_id).await;
                Ok(())
            }
            ClientEvent::Signal {
                room_id,
                from_user_id,
                to_user_id,
                signal,
            } => {
                self.handle_signal(room_id, from_user_id, to_user_id, signal)
                    .await
            }
            ClientEvent::Mute { room_id, user_id } => {
                self.handle_mute(&room_id, &user_id, true).await;
                Ok(())
            }
            ClientEvent::Unmute { room_id, user_id } => {
                self.handle_mute(&room_id, &user_id, false).await;
                Ok(())
            }
            ClientEvent::VideoOn { room_id, user_id } => {
                self.handle_video(&room_id, &user_id, true).await;
                Ok(())
            }
            ClientEvent::VideoOff { room_id, user_id } => {
                self.handle_video(&room_id, &user_id, false).await;
                Ok(())
            }
        }
    }

    /// Translate a closed connection into the same cleanup as an explicit
    /// leave. Safe to race with one: whichever path runs second resolves
    /// nothing and no-ops.
    pub async fn handle_disconnect(&self, connection_id: Uuid) {
        match self.registry.resolve_connection(connection_id).await {
            Some((room_id, user_id)) => {
                tracing::info!(
                    "Connection {} closed; removing '{}' from room '{}'",
                    connection_id,
                    user_id,
                    room_id
                );
                self.remove_participant(&room_id, &user_id).await;
            }
            None => {
                tracing::debug!(
                    "Connection {} closed with no room membership",
                    connection_id
                );
            }
        }
    }

    async fn handle_join(
        &self,
        connection_id: Uuid,
        room_id: &str,
        user_id: &str,
        peer_id: &str,
        display_name: &str,
    ) -> Result<(), SignalingError> {
        let outcome = self
            .registry
            .join(room_id, user_id, peer_id, display_name, connection_id)
            .await?;

        match outcome.kind {
            JoinKind::NewJoin => {
                tracing::info!("User '{}' joined room '{}'", user_id, room_id);
            }
            JoinKind::Reconnect => {
                tracing::info!("User '{}' reconnected to room '{}'", user_id, room_id);
            }
        }

        let peers = outcome.others.iter().map(PeerInfo::from).collect();
        self.sink
            .send(connection_id, ServerEvent::PeersList { peers })
            .await;

        // Announced on reconnection as well: the other side needs the fresh
        // peer id to re-establish its media link.
        let joined = ServerEvent::PeerJoined {
            user_id: outcome.participant.user_id.clone(),
            peer_id: outcome.participant.peer_id.clone(),
            display_name: outcome.participant.display_name.clone(),
            is_muted: outcome.participant.is_muted,
            is_video_enabled: outcome.participant.is_video_enabled,
        };
        for other in &outcome.others {
            self.sink.send(other.connection_id, joined.clone()).await;
        }

        Ok(())
    }

    async fn handle_signal(
        &self,
        room_id: Option<String>,
        from_user_id: Option<String>,
        to_user_id: Option<String>,
        signal: Option<serde_json::Value>,
    ) -> Result<(), SignalingError> {
        let room_id = require_signal_field(room_id, "roomId")?;
        let from_user_id = require_signal_field(from_user_id, "fromUserId")?;
        let to_user_id = require_signal_field(to_user_id, "toUserId")?;
        let signal = signal.ok_or(SignalingError::InvalidSignal("missing signal payload"))?;

        if !self.registry.room_exists(&room_id).await {
            return Err(SignalingError::RoomNotFound(room_id));
        }
        let target = self
            .registry
            .find_participant(&room_id, &to_user_id)
            .await
            .ok_or_else(|| SignalingError::UserNotFound(to_user_id.clone()))?;

        // The sender may have dropped out between sending and relay; the
        // forward still goes through with an empty media address.
        let from_peer_id = self
            .registry
            .find_participant(&room_id, &from_user_id)
            .await
            .map(|p| p.peer_id)
            .unwrap_or_default();

        tracing::debug!(
            "Forwarding signal '{}' -> '{}' in room '{}'",
            from_user_id,
            to_user_id,
            room_id
        );

        // Unicast: only the named target's current connection sees this.
        self.sink
            .send(
                target.connection_id,
                ServerEvent::Signal {
                    from_user_id,
                    from_peer_id,
                    to_user_id,
                    signal,
                },
            )
            .await;

        Ok(())
    }

    async fn handle_mute(&self, room_id: &str, user_id: &str, muted: bool) {
        match self.registry.set_mute(room_id, user_id, muted).await {
            Some(participant) => {
                self.broadcast(
                    room_id,
                    ServerEvent::MuteStatus {
                        user_id: participant.user_id,
                        is_muted: participant.is_muted,
                    },
                )
                .await;
            }
            None => {
                // Routinely hit when a status event races the user's own
                // leave; deliberately not an error.
                tracing::debug!(
                    "Ignoring mute update for unknown '{}' in room '{}'",
                    user_id,
                    room_id
                );
            }
        }
    }

    async fn handle_video(&self, room_id: &str, user_id: &str, enabled: bool) {
        match self.registry.set_video(room_id, user_id, enabled).await {
            Some(participant) => {
                self.broadcast(
                    room_id,
                    ServerEvent::VideoStatus {
                        user_id: participant.user_id,
                        is_video_enabled: participant.is_video_enabled,
                    },
                )
                .await;
            }
            None => {
                tracing::debug!(
                    "Ignoring video update for unknown '{}' in room '{}'",
                    user_id,
                    room_id
                );
            }
        }
    }

    /// Shared cleanup for explicit leave and transport close.
    async fn remove_participant(&self, room_id: &str, user_id: &str) {
        match self.registry.leave(room_id, user_id).await {
            Some(removed) => {
                tracing::info!("User '{}' left room '{}'", user_id, room_id);
                self.broadcast(
                    room_id,
                    ServerEvent::PeerLeft {
                        user_id: removed.user_id,
                        peer_id: removed.peer_id,
                    },
                )
                .await;
            }
            None => {
                tracing::debug!(
                    "Ignoring leave for unknown '{}' in room '{}'",
                    user_id,
                    room_id
                );
            }
        }
    }

    /// Deliver one event to every current member of a room, sender included.
    async fn broadcast(&self, room_id: &str, event: ServerEvent) {
        for member in self.registry.list_members(room_id).await {
            self.sink.send(member.connection_id, event.clone()).await;
        }
    }
}

fn require_signal_field(
    value: Option<String>,
    field: &'static str,
) -> Result<String, SignalingError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SignalingError::InvalidSignal(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Sink that records every delivery for later assertions.
    #[derive(Default)]
    struct RecordingSink {
        deliveries: Mutex<Vec<(Uuid, ServerEvent)>>,
    }

    impl RecordingSink {
        async fn deliveries(&self) -> Vec<(Uuid, ServerEvent)> {
            self.deliveries.lock().await.clone()
        }

        async fn deliveries_to(&self, connection_id: Uuid) -> Vec<ServerEvent> {
            self.deliveries
                .lock()
                .await
                .iter()
                .filter(|(target, _)| *target == connection_id)
                .map(|(_, event)| event.clone())
                .collect()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn send(&self, connection_id: Uuid, event: ServerEvent) {
            self.deliveries.lock().await.push((connection_id, event));
        }
    }

    fn relay_with_recorder() -> (SignalingRelay, Arc<RoomRegistry>, Arc<RecordingSink>) {
        let registry = Arc::new(RoomRegistry::new(10));
        let sink = Arc::new(RecordingSink::default());
        let relay = SignalingRelay::new(registry.clone(), sink.clone());
        (relay, registry, sink)
    }

    async fn join(relay: &SignalingRelay, connection_id: Uuid, room_id: &str, user_id: &str) {
        relay
            .handle_event(
                connection_id,
                ClientEvent::Join {
                    room_id: room_id.to_string(),
                    user_id: user_id.to_string(),
                    peer_id: format!("peer-{user_id}"),
                    display_name: user_id.to_string(),
                },
            )
            .await
            .expect("join should succeed");
    }

    #[tokio::test]
    async fn test_join_sends_peers_list_to_caller_and_peer_joined_to_others() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;

        // when:
        join(&relay, bob, "r1", "bob").await;

        // then: bob got the peers-list containing only alice
        let to_bob = sink.deliveries_to(bob).await;
        assert_eq!(to_bob.len(), 1);
        let ServerEvent::PeersList { peers } = &to_bob[0] else {
            panic!("expected peers-list, got {:?}", to_bob[0]);
        };
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].user_id, "alice");
        assert!(peers[0].is_muted);

        // and: alice got exactly one peer-joined for bob (plus her own
        // empty peers-list from earlier)
        let to_alice = sink.deliveries_to(alice).await;
        assert_eq!(
            to_alice[1],
            ServerEvent::PeerJoined {
                user_id: "bob".to_string(),
                peer_id: "peer-bob".to_string(),
                display_name: "bob".to_string(),
                is_muted: true,
                is_video_enabled: false,
            }
        );
    }

    #[tokio::test]
    async fn test_join_failure_emits_error_to_caller_only() {
        // given: a full room
        let registry = Arc::new(RoomRegistry::new(1));
        let sink = Arc::new(RecordingSink::default());
        let relay = SignalingRelay::new(registry, sink.clone());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;

        // when: the overflow join arrives as a raw frame
        relay
            .handle_text(
                bob,
                r#"{"type":"join","roomId":"r1","userId":"bob","peerId":"peer-bob"}"#,
            )
            .await;

        // then:
        let to_bob = sink.deliveries_to(bob).await;
        assert_eq!(to_bob.len(), 1);
        let ServerEvent::Error { code, .. } = &to_bob[0] else {
            panic!("expected error, got {:?}", to_bob[0]);
        };
        assert_eq!(code, "ROOM_FULL");
        // alice saw nothing beyond her own peers-list
        assert_eq!(sink.deliveries_to(alice).await.len(), 1);
    }

    #[tokio::test]
    async fn test_signal_is_unicast_to_target_connection() {
        // given: three participants, delivery checked with a strict mock
        let registry = Arc::new(RoomRegistry::new(10));
        let setup_sink = Arc::new(RecordingSink::default());
        let setup_relay = SignalingRelay::new(registry.clone(), setup_sink);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        join(&setup_relay, alice, "r1", "alice").await;
        join(&setup_relay, bob, "r1", "bob").await;
        join(&setup_relay, carol, "r1", "carol").await;

        let mut mock = MockEventSink::new();
        mock.expect_send()
            .withf(move |connection_id, event| {
                *connection_id == bob
                    && matches!(
                        event,
                        ServerEvent::Signal { from_user_id, to_user_id, .. }
                            if from_user_id == "alice" && to_user_id == "bob"
                    )
            })
            .times(1)
            .returning(|_, _| ());
        let relay = SignalingRelay::new(registry, Arc::new(mock));

        // when:
        let result = relay
            .handle_event(
                alice,
                ClientEvent::Signal {
                    room_id: Some("r1".to_string()),
                    from_user_id: Some("alice".to_string()),
                    to_user_id: Some("bob".to_string()),
                    signal: Some(json!({"type": "offer", "sdp": "v=0"})),
                },
            )
            .await;

        // then: the mock verifies exactly one delivery, to bob only
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_signal_forward_carries_both_peer_identifiers() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;
        join(&relay, bob, "r1", "bob").await;

        // when:
        relay
            .handle_event(
                alice,
                ClientEvent::Signal {
                    room_id: Some("r1".to_string()),
                    from_user_id: Some("alice".to_string()),
                    to_user_id: Some("bob".to_string()),
                    signal: Some(json!({"type": "answer", "sdp": "v=0"})),
                },
            )
            .await
            .unwrap();

        // then:
        let forwarded = sink.deliveries_to(bob).await.pop().unwrap();
        assert_eq!(
            forwarded,
            ServerEvent::Signal {
                from_user_id: "alice".to_string(),
                from_peer_id: "peer-alice".to_string(),
                to_user_id: "bob".to_string(),
                signal: json!({"type": "answer", "sdp": "v=0"}),
            }
        );
    }

    #[tokio::test]
    async fn test_signal_with_missing_fields_is_invalid() {
        // given:
        let (relay, _, _) = relay_with_recorder();

        // when:
        let result = relay
            .handle_event(
                Uuid::new_v4(),
                ClientEvent::Signal {
                    room_id: Some("r1".to_string()),
                    from_user_id: Some("alice".to_string()),
                    to_user_id: None,
                    signal: Some(json!({"type": "offer"})),
                },
            )
            .await;

        // then:
        assert_eq!(result, Err(SignalingError::InvalidSignal("toUserId")));
    }

    #[tokio::test]
    async fn test_signal_to_unknown_room_or_user() {
        // given:
        let (relay, _, _) = relay_with_recorder();
        let alice = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;

        // when/then: unknown room
        let result = relay
            .handle_event(
                alice,
                ClientEvent::Signal {
                    room_id: Some("r9".to_string()),
                    from_user_id: Some("alice".to_string()),
                    to_user_id: Some("bob".to_string()),
                    signal: Some(json!({"type": "offer"})),
                },
            )
            .await;
        assert_eq!(result, Err(SignalingError::RoomNotFound("r9".to_string())));

        // when/then: known room, unknown target
        let result = relay
            .handle_event(
                alice,
                ClientEvent::Signal {
                    room_id: Some("r1".to_string()),
                    from_user_id: Some("alice".to_string()),
                    to_user_id: Some("bob".to_string()),
                    signal: Some(json!({"type": "offer"})),
                },
            )
            .await;
        assert_eq!(result, Err(SignalingError::UserNotFound("bob".to_string())));
    }

    #[tokio::test]
    async fn test_mute_status_broadcast_includes_sender() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;
        join(&relay, bob, "r1", "bob").await;

        // when:
        relay
            .handle_event(
                bob,
                ClientEvent::Unmute {
                    room_id: "r1".to_string(),
                    user_id: "bob".to_string(),
                },
            )
            .await
            .unwrap();

        // then: both members, bob included, observe the new level
        let expected = ServerEvent::MuteStatus {
            user_id: "bob".to_string(),
            is_muted: false,
        };
        assert!(sink.deliveries_to(alice).await.contains(&expected));
        assert!(sink.deliveries_to(bob).await.contains(&expected));
    }

    #[tokio::test]
    async fn test_video_status_broadcast() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;

        // when:
        relay
            .handle_event(
                alice,
                ClientEvent::VideoOn {
                    room_id: "r1".to_string(),
                    user_id: "alice".to_string(),
                },
            )
            .await
            .unwrap();

        // then:
        assert!(sink.deliveries_to(alice).await.contains(&ServerEvent::VideoStatus {
            user_id: "alice".to_string(),
            is_video_enabled: true,
        }));
    }

    #[tokio::test]
    async fn test_status_update_for_stale_user_is_silent() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let ghost = Uuid::new_v4();

        // when: mute for a user that already left
        relay
            .handle_event(
                ghost,
                ClientEvent::Mute {
                    room_id: "r1".to_string(),
                    user_id: "ghost".to_string(),
                },
            )
            .await
            .unwrap();

        // then: no error event, no broadcast
        assert!(sink.deliveries().await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_matches_explicit_leave() {
        // given:
        let (relay, registry, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;
        join(&relay, bob, "r1", "bob").await;

        // when: alice's transport drops without an explicit leave
        relay.handle_disconnect(alice).await;

        // then: bob sees the same peer-left an explicit leave would produce
        assert!(sink.deliveries_to(bob).await.contains(&ServerEvent::PeerLeft {
            user_id: "alice".to_string(),
            peer_id: "peer-alice".to_string(),
        }));
        assert_eq!(registry.participant_count().await, 1);
    }

    #[tokio::test]
    async fn test_leave_then_disconnect_broadcasts_once() {
        // given:
        let (relay, registry, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;
        join(&relay, bob, "r1", "bob").await;

        // when: explicit leave, then the socket close races in
        relay
            .handle_event(
                alice,
                ClientEvent::Leave {
                    room_id: "r1".to_string(),
                    user_id: "alice".to_string(),
                },
            )
            .await
            .unwrap();
        relay.handle_disconnect(alice).await;

        // then: one removal, one broadcast
        let peer_lefts = sink
            .deliveries_to(bob)
            .await
            .into_iter()
            .filter(|event| matches!(event, ServerEvent::PeerLeft { .. }))
            .count();
        assert_eq!(peer_lefts, 1);
        assert_eq!(registry.participant_count().await, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_invalid_payload_error() {
        // given:
        let (relay, _, sink) = relay_with_recorder();
        let connection_id = Uuid::new_v4();

        // when:
        relay.handle_text(connection_id, "not json at all").await;

        // then:
        let deliveries = sink.deliveries_to(connection_id).await;
        assert_eq!(deliveries.len(), 1);
        let ServerEvent::Error { code, .. } = &deliveries[0] else {
            panic!("expected error, got {:?}", deliveries[0]);
        };
        assert_eq!(code, "INVALID_PAYLOAD");
    }

    #[tokio::test]
    async fn test_reconnect_refreshes_peer_id_for_others() {
        // given:
        let (relay, registry, sink) = relay_with_recorder();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        join(&relay, alice, "r1", "alice").await;
        join(&relay, bob, "r1", "bob").await;

        // when: bob reconnects on a fresh connection with a new peer id
        let bob2 = Uuid::new_v4();
        relay
            .handle_event(
                bob2,
                ClientEvent::Join {
                    room_id: "r1".to_string(),
                    user_id: "bob".to_string(),
                    peer_id: "peer-bob-2".to_string(),
                    display_name: "bob".to_string(),
                },
            )
            .await
            .unwrap();

        // then: no peer-left fired, alice learned the new peer id
        let to_alice = sink.deliveries_to(alice).await;
        assert!(
            !to_alice
                .iter()
                .any(|event| matches!(event, ServerEvent::PeerLeft { .. }))
        );
        assert!(to_alice.contains(&ServerEvent::PeerJoined {
            user_id: "bob".to_string(),
            peer_id: "peer-bob-2".to_string(),
            display_name: "bob".to_string(),
            is_muted: true,
            is_video_enabled: false,
        }));
        assert_eq!(registry.participant_count().await, 2);
    }
}
