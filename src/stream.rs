//! Long-poll consumer with explicit cadence.

use std::collections::VecDeque;
use std::time::Duration;

use crate::client::Session;
use crate::error::ProtocolError;
use crate::protocol::{PresenceEvent, Topic};

/// How long to keep polling for an expected event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two polls that did not produce the event
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: 3,
        }
    }
}

/// Reads the event stream of one session.
///
/// Events that did not match a `wait_for` are kept, in arrival order, so a
/// later `wait_for` can still find them. The backlog starts with whatever
/// the session's sign-in poll flushed.
#[derive(Debug)]
pub struct EventStream<'s, 'c> {
    session: &'s Session<'c>,
    policy: PollPolicy,
    backlog: VecDeque<PresenceEvent>,
}

impl<'s, 'c> EventStream<'s, 'c> {
    pub fn new(session: &'s Session<'c>, policy: PollPolicy) -> Self {
        Self {
            session,
            policy,
            backlog: session.flushed().iter().cloned().collect(),
        }
    }

    pub fn session(&self) -> &'s Session<'c> {
        self.session
    }

    /// Events received but not yet claimed by `wait_for`.
    pub fn backlog(&self) -> impl Iterator<Item = &PresenceEvent> {
        self.backlog.iter()
    }

    /// Single poll; the events are not added to the backlog.
    pub async fn next_batch(&self) -> Result<Vec<PresenceEvent>, ProtocolError> {
        self.session.poll().await
    }

    fn take_from_backlog(&mut self, topic: &Topic, peer: &str) -> Option<PresenceEvent> {
        let index = self.backlog.iter().position(|e| e.is(topic, peer))?;
        self.backlog.remove(index)
    }

    /// Poll until an event with `topic` from `peer` shows up.
    pub async fn wait_for(
        &mut self,
        topic: Topic,
        peer: &str,
    ) -> Result<PresenceEvent, ProtocolError> {
        if let Some(event) = self.take_from_backlog(&topic, peer) {
            return Ok(event);
        }

        for attempt in 1..=self.policy.max_attempts {
            let batch = self.session.poll().await?;
            tracing::trace!(attempt, count = batch.len(), "stream poll");
            self.backlog.extend(batch);

            if let Some(event) = self.take_from_backlog(&topic, peer) {
                return Ok(event);
            }
            if attempt < self.policy.max_attempts && !self.policy.interval.is_zero() {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        Err(ProtocolError::EventNotFound {
            topic,
            peer: peer.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// Poll `polls` times; every response must be `[]`.
    pub async fn expect_empty(&self, polls: u32) -> Result<(), ProtocolError> {
        for _ in 0..polls {
            let events = self.session.poll().await?;
            if !events.is_empty() {
                return Err(ProtocolError::NonEmptyBacklog {
                    nick: self.session.nick().to_string(),
                    events,
                });
            }
        }
        Ok(())
    }
}

/// First event in `events` with `topic` from `peer`.
pub fn find_event<'e>(
    events: &'e [PresenceEvent],
    topic: &Topic,
    peer: &str,
) -> Option<&'e PresenceEvent> {
    events.iter().find(|e| e.is(topic, peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn find_event_matches_topic_and_peer() {
        let events = vec![
            PresenceEvent::new(Topic::UserJoined, json!("carol")),
            PresenceEvent::new(Topic::Offer, json!({"peer": "bob"})),
            PresenceEvent::new(Topic::Offer, json!({"peer": "alice"})),
        ];
        let found = find_event(&events, &Topic::Offer, "alice").unwrap();
        assert_eq!(found.peer(), Some("alice"));
        assert!(find_event(&events, &Topic::Hangup, "alice").is_none());
    }
}
