use std::net::SocketAddr;

use talkilla_signal::config::ServerConfig;
use talkilla_signal::server::{self, AppState};
use talkilla_signal::logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();
    logging::init(&config.log_level);

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(
        long_polling_timeout_ms = config.long_polling_timeout.as_millis() as u64,
        presence_broadcast = config.presence_broadcast,
        presence_roster = config.presence_roster,
        "configuration loaded"
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("signaling server running on http://{}", addr);

    if let Err(e) = server::serve(listener, AppState::new(config)).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}
