//! WebSocket signaling server implementation.

mod handler;
mod http;
mod runner;
mod signal;
mod sink;
mod state;

pub use runner::run_server;
pub use sink::WebSocketEventSink;
pub use state::AppState;
