//! Call-room signaling server library.
//!
//! This library provides the room registry and signaling relay for
//! room-scoped WebRTC calls: clients join a room over WebSocket, exchange
//! opaque offer/answer/ice-candidate payloads through the relay, and
//! establish their media connections directly with each other.

// layers
pub mod config;
pub mod domain;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;

// shared library
pub mod common;
