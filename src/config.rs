use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::scenario::ScenarioKind;
use crate::stream::PollPolicy;

/// Host used when `TALKILLA_SERVER` is not set
pub const DEFAULT_SERVER: &str = "localhost:5000";

fn env_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Signaling server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,

    /// How long a `stream` request is held open without events
    pub long_polling_timeout: Duration,

    /// Period of the presence reaper
    pub reaper_interval: Duration,

    /// Send `userJoined` / `userLeft` to other present users
    pub presence_broadcast: bool,

    /// Push a `users` roster into the caller's stream on `presenceRequest`
    pub presence_roster: bool,

    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            long_polling_timeout: Duration::from_millis(20_000),
            reaper_interval: Duration::from_millis(20_000),
            presence_broadcast: false,
            presence_roster: false,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Builds the config from any key lookup; unset or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key).and_then(|v| parse_bool(&v)).unwrap_or(default)
        };

        let timeout_ms = env_or(
            &lookup,
            "LONG_POLLING_TIMEOUT_MS",
            defaults.long_polling_timeout.as_millis() as u64,
        );
        // Reaper follows the long-poll timeout unless overridden.
        let reaper_ms = env_or(&lookup, "REAPER_INTERVAL_MS", timeout_ms);

        Self {
            host: env_or(&lookup, "HOST", defaults.host),
            port: env_or(&lookup, "PORT", defaults.port),
            long_polling_timeout: Duration::from_millis(timeout_ms),
            reaper_interval: Duration::from_millis(reaper_ms.max(1)),
            presence_broadcast: flag("PRESENCE_BROADCAST", defaults.presence_broadcast),
            presence_roster: flag("PRESENCE_ROSTER", defaults.presence_roster),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Users idle for longer than this are disconnected.
    pub fn presence_ttl(&self) -> Duration {
        self.long_polling_timeout * 2
    }
}

/// Protocol client and load driver configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host, optionally with a port; a scheme may be given explicitly
    pub server: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,

    pub users: usize,
    pub iterations: usize,
    pub scenario: ScenarioKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            request_timeout: Duration::from_secs(30),
            poll: PollPolicy::default(),
            users: 10,
            iterations: 1,
            scenario: ScenarioKind::Call,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            server: lookup("TALKILLA_SERVER").unwrap_or(defaults.server),
            request_timeout: Duration::from_secs(env_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            poll: PollPolicy {
                interval: Duration::from_millis(env_or(
                    &lookup,
                    "POLL_INTERVAL_MS",
                    defaults.poll.interval.as_millis() as u64,
                )),
                max_attempts: env_or(&lookup, "POLL_MAX_ATTEMPTS", defaults.poll.max_attempts)
                    .max(1),
            },
            users: env_or(&lookup, "LOAD_USERS", defaults.users).max(1),
            iterations: env_or(&lookup, "LOAD_ITERATIONS", defaults.iterations),
            scenario: env_or(&lookup, "LOAD_SCENARIO", defaults.scenario),
        }
    }

    /// Root URL of the server, always ending with `/`.
    pub fn base_url(&self) -> String {
        base_url(&self.server)
    }
}

/// Normalises a host (`example.com`, `host:5000`, `http://host/`) into a
/// root URL that endpoint names can be appended to.
pub fn base_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        format!("{}/", server)
    } else {
        format!("http://{}/", server)
    }
}
