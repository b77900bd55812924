#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use talkilla_signal::config::ServerConfig;
use talkilla_signal::server::{self, AppState};
use talkilla_signal::{PollPolicy, SignalingClient};
use tokio::net::TcpListener;

/// Long-poll timeout used by most tests
pub const SHORT_POLL: Duration = Duration::from_millis(300);

pub fn short_config() -> ServerConfig {
    ServerConfig {
        long_polling_timeout: SHORT_POLL,
        reaper_interval: Duration::from_secs(60),
        ..ServerConfig::default()
    }
}

pub fn policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::ZERO,
        max_attempts: 3,
    }
}

/// Starts the signaling server on an ephemeral port.
pub async fn spawn_server(config: ServerConfig) -> (SignalingClient, AppState, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(config);

    tokio::spawn(server::serve(listener, state.clone()));

    let client = SignalingClient::new(reqwest::Client::new(), &addr.to_string());
    (client, state, addr)
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn nick() -> String {
    uuid::Uuid::new_v4().to_string()
}
