//! Scripted conversations between virtual users.

use std::fmt;
use std::str::FromStr;

use crate::client::{Session, SignalingClient};
use crate::error::ScenarioError;
use crate::protocol::Topic;
use crate::stream::{EventStream, PollPolicy};

/// Number of empty polls in the simple sign-in scenario
pub const SIMPLE_POLLS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Sign in, poll an empty stream, sign out
    Simple,
    /// Two users: offer, answer, hangup
    Call,
}

impl FromStr for ScenarioKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "signin" => Ok(ScenarioKind::Simple),
            "call" => Ok(ScenarioKind::Call),
            other => Err(format!("unknown scenario {other:?}")),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioKind::Simple => f.write_str("simple"),
            ScenarioKind::Call => f.write_str("call"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    OfferSent,
    Accepted,
    HungUp,
}

impl CallState {
    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::OfferSent => "offer-sent",
            CallState::Accepted => "accepted",
            CallState::HungUp => "hung-up",
        }
    }
}

/// A call between two nicknames as seen by the scenario driver.
#[derive(Debug)]
pub struct Call {
    caller: String,
    callee: String,
    state: CallState,
}

impl Call {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            state: CallState::Idle,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    fn check(&self, allowed: &[CallState], action: &'static str) -> Result<(), ScenarioError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ScenarioError::InvalidTransition {
                from: self.state.as_str(),
                action,
            })
        }
    }

    /// Caller offers the call to the callee.
    pub async fn offer(&mut self, caller: &Session<'_>) -> Result<(), ScenarioError> {
        self.check(&[CallState::Idle, CallState::HungUp], "offer")?;
        caller.offer(&self.callee).await?;
        self.state = CallState::OfferSent;
        Ok(())
    }

    /// Callee accepts the pending offer.
    pub async fn accept(&mut self, callee: &Session<'_>) -> Result<(), ScenarioError> {
        self.check(&[CallState::OfferSent], "accept")?;
        callee.accept(&self.caller).await?;
        self.state = CallState::Accepted;
        Ok(())
    }

    /// Either party ends the call.
    pub async fn hangup(&mut self, party: &Session<'_>) -> Result<(), ScenarioError> {
        self.check(&[CallState::Accepted], "hangup")?;
        let other = if party.nick() == self.caller {
            &self.callee
        } else {
            &self.caller
        };
        party.hangup(other).await?;
        self.state = CallState::HungUp;
        Ok(())
    }

    /// Back to idle once the hangup reached the other side.
    pub fn reset(&mut self) {
        if self.state == CallState::HungUp {
            self.state = CallState::Idle;
        }
    }
}

/// Sign in, see only empty polls, sign out.
pub async fn simple_sign_in(
    client: &SignalingClient,
    nick: &str,
    policy: PollPolicy,
) -> Result<(), ScenarioError> {
    let session = client.sign_in(nick).await?;
    EventStream::new(&session, policy)
        .expect_empty(SIMPLE_POLLS)
        .await?;
    session.sign_out().await?;
    Ok(())
}

/// `caller` calls `callee`, the call is accepted, then `caller` hangs up.
pub async fn call(
    client: &SignalingClient,
    caller: &str,
    callee: &str,
    policy: PollPolicy,
) -> Result<(), ScenarioError> {
    let caller_session = client.sign_in(caller).await?;
    let callee_session = client.sign_in(callee).await?;

    let mut caller_stream = EventStream::new(&caller_session, policy);
    let mut callee_stream = EventStream::new(&callee_session, policy);
    let mut call = Call::new(caller, callee);

    call.offer(&caller_session).await?;
    callee_stream.wait_for(Topic::Offer, caller).await?;

    call.accept(&callee_session).await?;
    caller_stream.wait_for(Topic::Answer, callee).await?;

    call.hangup(&caller_session).await?;
    callee_stream.wait_for(Topic::Hangup, caller).await?;
    call.reset();

    caller_session.sign_out().await?;
    callee_session.sign_out().await?;
    Ok(())
}
