use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Endpoint paths, relative to the server root.
pub mod endpoint {
    pub const SIGNIN: &str = "signin";
    pub const SIGNOUT: &str = "signout";
    pub const STREAM: &str = "stream";
    pub const PRESENCE_REQUEST: &str = "presenceRequest";
    pub const CALL_OFFER: &str = "calloffer";
    pub const CALL_ACCEPTED: &str = "callaccepted";
    pub const CALL_HANGUP: &str = "callhangup";
    pub const ICE_CANDIDATE: &str = "icecandidate";
    /// Followed by `/<email>`
    pub const INSTANT_SHARE: &str = "instant-share";
}

/// Event kinds carried on the stream. Unknown kinds survive a round trip
/// through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Topic {
    Offer,
    Answer,
    Hangup,
    IceCandidate,
    Disconnect,
    UserJoined,
    UserLeft,
    Users,
    InstantShare,
    Other(String),
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Topic::Offer => "offer",
            Topic::Answer => "answer",
            Topic::Hangup => "hangup",
            Topic::IceCandidate => "ice:candidate",
            Topic::Disconnect => "disconnect",
            Topic::UserJoined => "userJoined",
            Topic::UserLeft => "userLeft",
            Topic::Users => "users",
            Topic::InstantShare => "instantshare",
            Topic::Other(s) => s,
        }
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        match s.as_str() {
            "offer" => Topic::Offer,
            "answer" => Topic::Answer,
            "hangup" => Topic::Hangup,
            "ice:candidate" => Topic::IceCandidate,
            "disconnect" => Topic::Disconnect,
            "userJoined" => Topic::UserJoined,
            "userLeft" => Topic::UserLeft,
            "users" => Topic::Users,
            "instantshare" => Topic::InstantShare,
            _ => Topic::Other(s),
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        match topic {
            Topic::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a stream response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub topic: Topic,
    #[serde(default)]
    pub data: Value,
}

impl PresenceEvent {
    pub fn new(topic: Topic, data: Value) -> Self {
        Self { topic, data }
    }

    /// The counter-party nickname, when `data` is an object with a `peer`.
    pub fn peer(&self) -> Option<&str> {
        self.data.get("peer").and_then(Value::as_str)
    }

    pub fn is(&self, topic: &Topic, peer: &str) -> bool {
        &self.topic == topic && self.peer() == Some(peer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub assertion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub nick: String,
}

/// Body of `signout`, `presenceRequest` and `stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NickRequest {
    #[serde(default)]
    pub nick: String,
    /// Only meaningful for `stream`: answer `[]` right away.
    #[serde(
        rename = "firstRequest",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub first_request: bool,
}

impl NickRequest {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            first_request: false,
        }
    }
}

/// Body of the call-control endpoints. `data` is an open object; the
/// server forwards it with `peer` rewritten to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSignal {
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl CallSignal {
    pub fn new(nick: impl Into<String>, peer: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("peer".to_owned(), Value::String(peer.into()));
        Self {
            nick: nick.into(),
            data,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn peer(&self) -> Option<&str> {
        self.data.get("peer").and_then(Value::as_str)
    }
}
