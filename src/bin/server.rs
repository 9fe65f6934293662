//! Signaling server for room-scoped WebRTC calls.
//!
//! Tracks who is in which call room and relays offer/answer/ice-candidate
//! payloads between peers; media never flows through this process.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use callroom_rs::{
    common::logger::setup_logger,
    config::Config,
    registry::RoomRegistry,
    server::{AppState, run_server},
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "WebRTC call-room signaling server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Room limits come from the environment; host/port from the CLI
    let config = Config::from_env();
    let registry = Arc::new(RoomRegistry::from_config(&config));
    let state = Arc::new(AppState::new(registry));

    if let Err(e) = run_server(args.host, args.port, state).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
