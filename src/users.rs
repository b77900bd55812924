//! Presence model: who is online and what is waiting for them.
//!
//! Every present user owns a queue of [`PresenceEvent`]s and a
//! [`Notify`] that wakes its pending long-poll. Events are drained
//! atomically, so two polls never see the same event.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::protocol::{PresenceEvent, Topic};

#[derive(Debug)]
pub struct User {
    nick: String,
    events: Mutex<VecDeque<PresenceEvent>>,
    waiter: Notify,
    last_seen: Mutex<Instant>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned queue is still a valid queue.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            events: Mutex::new(VecDeque::new()),
            waiter: Notify::new(),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Queue an event and wake the pending poll, if any.
    pub fn send(&self, topic: Topic, data: Value) {
        lock(&self.events).push_back(PresenceEvent::new(topic, data));
        self.waiter.notify_waiters();
    }

    /// Extend the presence deadline.
    pub fn touch(&self) {
        *lock(&self.last_seen) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }

    pub fn pending(&self) -> usize {
        lock(&self.events).len()
    }

    fn drain(&self) -> Vec<PresenceEvent> {
        lock(&self.events).drain(..).collect()
    }

    /// Long-poll: answer immediately if events are queued, otherwise wait
    /// for one to arrive or for `timeout` to elapse.
    pub async fn wait_for_events(&self, timeout: Duration) -> Vec<PresenceEvent> {
        // Registered before the queue check so a concurrent `send` cannot
        // slip between the check and the wait.
        let notified = self.waiter.notified();

        let ready = self.drain();
        if !ready.is_empty() {
            return ready;
        }

        let _ = tokio::time::timeout(timeout, notified).await;
        self.drain()
    }
}

/// Present users indexed by nickname
#[derive(Debug, Clone, Default)]
pub struct Users {
    users: Arc<DashMap<String, Arc<User>>>,
}

impl Users {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, nick: &str) -> Option<Arc<User>> {
        self.users.get(nick).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.users.contains_key(nick)
    }

    /// Returns the user and whether it was just created.
    pub fn get_or_add(&self, nick: &str) -> (Arc<User>, bool) {
        match self.users.entry(nick.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let user = Arc::new(User::new(nick));
                entry.insert(Arc::clone(&user));
                (user, true)
            }
        }
    }

    pub fn remove(&self, nick: &str) -> Option<Arc<User>> {
        self.users.remove(nick).map(|(_, user)| user)
    }

    /// Remove `nick` only if it is still idle for longer than `ttl`.
    pub fn remove_if_idle(&self, nick: &str, ttl: Duration) -> Option<Arc<User>> {
        self.users
            .remove_if(nick, |_, user| user.idle_for() > ttl)
            .map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn nicks(&self) -> Vec<String> {
        self.users.iter().map(|entry| entry.key().clone()).collect()
    }

    /// `[{"nick": ..}, ..]` for every present user, sorted by nickname.
    pub fn roster(&self) -> Value {
        let mut nicks = self.nicks();
        nicks.sort();
        Value::Array(nicks.into_iter().map(|nick| json!({ "nick": nick })).collect())
    }

    /// Send to `nick` if present. Returns false when the event was dropped.
    pub fn send_to(&self, nick: &str, topic: Topic, data: Value) -> bool {
        match self.get(nick) {
            Some(user) => {
                user.send(topic, data);
                true
            }
            None => false,
        }
    }

    /// Send to every present user except `except`.
    pub fn broadcast(&self, except: &str, topic: Topic, data: Value) {
        for entry in self.users.iter() {
            if entry.key() != except {
                entry.value().send(topic.clone(), data.clone());
            }
        }
    }

    /// Nicknames idle for longer than `ttl`.
    pub fn expired(&self, ttl: Duration) -> Vec<String> {
        self.users
            .iter()
            .filter(|entry| entry.value().idle_for() > ttl)
            .map(|entry| entry.key().clone())
            .collect()
    }
}
