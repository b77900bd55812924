//! HTTP signaling service.
//!
//! Every endpoint takes a JSON body naming the acting nickname. Events
//! produced by one user are queued on the recipient's [`User`] and handed
//! out by its next `stream` long-poll.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::protocol::{
    CallSignal, NickRequest, PresenceEvent, SignInRequest, SignInResponse, Topic, endpoint,
};
use crate::users::{User, Users};

#[derive(Clone)]
pub struct AppState {
    /// Signed-in nicknames and when they signed in
    pub sessions: Arc<DashMap<String, Instant>>,
    /// Users currently considered online
    pub users: Users,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            users: Users::new(),
            config: Arc::new(config),
        }
    }

    fn require_session<'a>(&self, nick: &'a str) -> Result<&'a str, ApiError> {
        if nick.is_empty() {
            return Err(ApiError::MissingField("nick"));
        }
        if !self.sessions.contains_key(nick) {
            return Err(ApiError::NotSignedIn);
        }
        Ok(nick)
    }

    /// Mark `nick` as present, creating the user on first sight.
    pub fn setup_user(&self, nick: &str) -> Arc<User> {
        let (user, created) = self.users.get_or_add(nick);
        if created {
            tracing::info!(kind = "connection", "user connected");
            if self.config.presence_broadcast {
                self.users
                    .broadcast(nick, Topic::UserJoined, Value::String(nick.to_string()));
            }
        }
        user.touch();
        user
    }

    /// Drop `nick` from the presence list.
    pub fn disconnect(&self, nick: &str) -> bool {
        match self.users.remove(nick) {
            Some(_) => {
                self.user_left(nick);
                true
            }
            None => false,
        }
    }

    /// Drop `nick` only if it has not polled within the presence TTL.
    fn disconnect_if_idle(&self, nick: &str) -> bool {
        match self.users.remove_if_idle(nick, self.config.presence_ttl()) {
            Some(_) => {
                self.user_left(nick);
                true
            }
            None => false,
        }
    }

    fn user_left(&self, nick: &str) {
        tracing::info!(kind = "disconnection", "user disconnected");
        if self.config.presence_broadcast {
            self.users
                .broadcast(nick, Topic::UserLeft, Value::String(nick.to_string()));
        }
    }

    /// Forward a call-control signal from `signal.nick` to `signal.data.peer`
    /// with the peer rewritten to the sender.
    fn forward(&self, topic: Topic, signal: CallSignal) -> Result<StatusCode, ApiError> {
        let nick = self.require_session(&signal.nick)?.to_string();
        let peer = signal
            .peer()
            .filter(|p| !p.is_empty())
            .ok_or(ApiError::MissingField("data.peer"))?
            .to_string();

        if let Some(sender) = self.users.get(&nick) {
            sender.touch();
        }

        let mut data = signal.data;
        data.insert("peer".to_string(), Value::String(nick));

        if self.users.send_to(&peer, topic.clone(), Value::Object(data)) {
            tracing::info!(kind = %topic, "call signal forwarded");
        } else {
            // The peer may have just gone away; the caller is not told.
            tracing::warn!(kind = %topic, "could not forward event to non present peer");
        }
        Ok(StatusCode::NO_CONTENT)
    }
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    // The assertion stands in for a verified identity: it is the nickname,
    // echoed byte for byte.
    let nick = req.assertion;
    if nick.is_empty() {
        return Err(ApiError::MissingField("assertion"));
    }

    if state.sessions.insert(nick.clone(), Instant::now()).is_some() {
        tracing::debug!(kind = "signin", "nickname already signed in, session reused");
    }
    tracing::info!(kind = "signin", "user signed in");

    Ok(Json(SignInResponse { nick }))
}

pub async fn signout(
    State(state): State<AppState>,
    Json(req): Json<NickRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nick = state.require_session(&req.nick)?;
    state.sessions.remove(nick);

    if let Some(user) = state.users.get(nick) {
        user.send(Topic::Disconnect, Value::Null);
        state.disconnect(nick);
    }

    tracing::info!(kind = "signout", "user signed out");
    Ok((StatusCode::OK, Json(true)))
}

pub async fn stream(
    State(state): State<AppState>,
    Json(req): Json<NickRequest>,
) -> Result<Json<Vec<PresenceEvent>>, ApiError> {
    let nick = state.require_session(&req.nick)?;
    let user = state.setup_user(nick);

    if req.first_request {
        return Ok(Json(Vec::new()));
    }

    let events = user
        .wait_for_events(state.config.long_polling_timeout)
        .await;
    user.touch();
    tracing::trace!(count = events.len(), "long polling send");
    Ok(Json(events))
}

pub async fn presence_request(
    State(state): State<AppState>,
    Json(req): Json<NickRequest>,
) -> Result<StatusCode, ApiError> {
    let nick = state.require_session(&req.nick)?;
    let user = state.setup_user(nick);
    if state.config.presence_roster {
        user.send(Topic::Users, state.users.roster());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Someone opened an instant-share link for `email`: tell the signed-in
/// user so it can call them.
pub async fn instant_share(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<NickRequest>,
) -> Result<StatusCode, ApiError> {
    let nick = state.require_session(&req.nick)?;
    let Some(user) = state.users.get(nick) else {
        tracing::error!(
            kind = "instantshare",
            "instant-share link clicked by a user who is not present"
        );
        return Err(ApiError::NotPresent);
    };

    user.send(Topic::InstantShare, json!({ "peer": email }));
    tracing::info!(kind = "instantshare", "instant-share ping back");
    Ok(StatusCode::OK)
}

pub async fn call_offer(
    State(state): State<AppState>,
    Json(signal): Json<CallSignal>,
) -> Result<StatusCode, ApiError> {
    state.forward(Topic::Offer, signal)
}

pub async fn call_accepted(
    State(state): State<AppState>,
    Json(signal): Json<CallSignal>,
) -> Result<StatusCode, ApiError> {
    state.forward(Topic::Answer, signal)
}

pub async fn call_hangup(
    State(state): State<AppState>,
    Json(signal): Json<CallSignal>,
) -> Result<StatusCode, ApiError> {
    state.forward(Topic::Hangup, signal)
}

pub async fn ice_candidate(
    State(state): State<AppState>,
    Json(signal): Json<CallSignal>,
) -> Result<StatusCode, ApiError> {
    state.forward(Topic::IceCandidate, signal)
}

async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(&format!("/{}", endpoint::SIGNIN), post(signin))
        .route(&format!("/{}", endpoint::SIGNOUT), post(signout))
        .route(&format!("/{}", endpoint::STREAM), post(stream))
        .route(
            &format!("/{}", endpoint::PRESENCE_REQUEST),
            post(presence_request),
        )
        .route(&format!("/{}", endpoint::CALL_OFFER), post(call_offer))
        .route(&format!("/{}", endpoint::CALL_ACCEPTED), post(call_accepted))
        .route(&format!("/{}", endpoint::CALL_HANGUP), post(call_hangup))
        .route(&format!("/{}", endpoint::ICE_CANDIDATE), post(ice_candidate))
        .route(
            &format!("/{}/{{email}}", endpoint::INSTANT_SHARE),
            post(instant_share),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Disconnects users that stopped polling.
pub fn start_reaper_task(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.reaper_interval);
        loop {
            interval.tick().await;
            reap_idle_users(&state);
        }
    })
}

/// Removes every user idle for longer than the presence TTL. Returns how
/// many were removed.
pub fn reap_idle_users(state: &AppState) -> usize {
    let expired = state.users.expired(state.config.presence_ttl());
    let mut removed = 0;
    for nick in expired {
        // It may have polled since it was listed.
        if state.disconnect_if_idle(&nick) {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!(
            removed,
            present = state.users.len(),
            "presence cleanup complete"
        );
    }
    removed
}

/// Serves the signaling API on `listener` with a running reaper.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let reaper = start_reaper_task(state.clone());
    let result = axum::serve(listener, router(state)).await;
    reaper.abort();
    result
}
