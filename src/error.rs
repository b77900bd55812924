//! Error types for the signaling client, the scenario driver and the server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::protocol::{PresenceEvent, Topic};

/// Failures observed by the protocol client. None of them is retried.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The server answered with a status the protocol does not allow
    #[error("{endpoint}: expected status {expected}, got {actual}")]
    UnexpectedStatus {
        endpoint: &'static str,
        expected: u16,
        actual: u16,
    },

    /// Sign-in echoed a different nickname
    #[error("signin: expected nick {expected:?}, got {actual:?}")]
    NickMismatch { expected: String, actual: String },

    /// The body has the wrong shape for the endpoint
    #[error("{endpoint}: unexpected body {body}")]
    UnexpectedBody { endpoint: &'static str, body: String },

    /// The body is not valid JSON
    #[error("{endpoint}: malformed JSON: {source}")]
    Json {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An expected event never showed up on the stream
    #[error("no {topic} event from {peer:?} after {attempts} poll(s)")]
    EventNotFound {
        topic: Topic,
        peer: String,
        attempts: u32,
    },

    /// A poll that had to be empty returned events
    #[error("stream for {nick:?} was expected empty, got {} event(s)", .events.len())]
    NonEmptyBacklog {
        nick: String,
        events: Vec<PresenceEvent>,
    },

    /// The server root cannot carry a path
    #[error("cannot build a request URL from {url:?}")]
    InvalidUrl { url: String },

    /// Connection refused, timeout and other transport failures
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors raised while driving a scenario
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The scenario tried an action its call state does not allow
    #[error("cannot {action} while call is {from}")]
    InvalidTransition { from: &'static str, action: &'static str },
}

/// Errors returned by the server handlers
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request names a nickname without an active session
    #[error("not signed in")]
    NotSignedIn,

    /// A required body field is missing or empty
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Signed in, but not on the presence list
    #[error("not present")]
    NotPresent,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotSignedIn | ApiError::MissingField(_) | ApiError::NotPresent => {
                StatusCode::BAD_REQUEST
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
