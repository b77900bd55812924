//! Talkilla presence and call signaling.
//!
//! The protocol is JSON over HTTP POST:
//!
//! - **signin** `{assertion}` → 200 `{nick}`
//! - **presenceRequest** `{nick}` → 204
//! - **stream** `{nick}` → 200 `[{topic, data: {peer, ...}}, ...]` (long-poll)
//! - **calloffer** / **callaccepted** / **callhangup** / **icecandidate**
//!   `{nick, data: {peer, ...}}` → 204
//! - **signout** `{nick}` → 200 `true`
//! - **instant-share/{email}** `{nick}` → 200
//!
//! A call-control POST is delivered to `data.peer` as an `offer`, `answer`,
//! `hangup` or `ice:candidate` event on that user's next `stream` poll,
//! with `data.peer` rewritten to the sender.
//!
//! [`server`] implements the service, [`client`] and [`stream`] drive it,
//! and [`scenario`] / [`load`] replay the conversations used to load-test a
//! deployment.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod protocol;
pub mod scenario;
pub mod server;
pub mod stream;
pub mod users;

pub use client::{Session, SignalingClient};
pub use config::{ClientConfig, ServerConfig};
pub use error::{ApiError, ProtocolError, ScenarioError};
pub use protocol::{PresenceEvent, Topic};
pub use server::AppState;
pub use stream::{EventStream, PollPolicy};
