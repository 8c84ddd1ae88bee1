//! In-process message store.
//!
//! Backs the demo binary and the tests. Besides seeded history and live
//! pushes it can hold a peer's history fetch open and inject failures, which
//! makes slow-network and outage scenarios reproducible.

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::oneshot;

use super::{MessageSink, MessageStore, SubscriptionHandle};
use crate::error::{FetchError, SubscriptionError};
use crate::types::{Message, UserId};

pub struct MemoryStore {
    /// Conversation history keyed by the peer it is exchanged with
    history: DashMap<UserId, Vec<Message>>,
    subscribers: DashMap<u64, MessageSink>,
    /// Fetches for these peers wait until the matching hold is released
    holds: DashMap<UserId, oneshot::Receiver<()>>,
    /// One-shot fetch failures
    fetch_failures: DashMap<UserId, FetchError>,
    subscribe_failure: Mutex<Option<SubscriptionError>>,
    next_subscription_id: AtomicU64,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
            subscribers: DashMap::new(),
            holds: DashMap::new(),
            fetch_failures: DashMap::new(),
            subscribe_failure: Mutex::new(None),
            next_subscription_id: AtomicU64::new(1),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_history(self, peer_id: impl Into<UserId>, messages: Vec<Message>) -> Self {
        self.insert_history(peer_id, messages);
        self
    }

    /// Replace the stored history with `peer_id`.
    pub fn insert_history(&self, peer_id: impl Into<UserId>, messages: Vec<Message>) {
        self.history.insert(peer_id.into(), messages);
    }

    /// Make the next history fetch for `peer_id` wait until the returned
    /// hold is released or dropped.
    pub fn hold_history(&self, peer_id: impl Into<UserId>) -> HistoryHold {
        let (release, wait) = oneshot::channel();
        self.holds.insert(peer_id.into(), wait);
        HistoryHold { release }
    }

    /// Make the next history fetch for `peer_id` fail with `error`.
    pub fn fail_next_fetch(&self, peer_id: impl Into<UserId>, error: FetchError) {
        self.fetch_failures.insert(peer_id.into(), error);
    }

    /// Make every subscribe attempt fail with `error` until cleared with `None`.
    pub fn fail_subscriptions(&self, error: Option<SubscriptionError>) {
        if let Ok(mut slot) = self.subscribe_failure.lock() {
            *slot = error;
        }
    }

    /// Deliver `message` to every open subscription. Returns the number of
    /// subscribers reached. Stored history is left untouched.
    pub fn push(&self, message: Message) -> usize {
        // Collect first so no map guard is held while sinks run.
        let sinks: Vec<MessageSink> = self
            .subscribers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for sink in &sinks {
            sink(message.clone());
        }
        sinks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_history(&self, peer_id: &UserId) -> Result<Vec<Message>, FetchError> {
        if let Some((_, hold)) = self.holds.remove(peer_id) {
            // A dropped hold releases the fetch as well.
            let _ = hold.await;
        }
        if let Some((_, error)) = self.fetch_failures.remove(peer_id) {
            return Err(error);
        }
        self.history
            .get(peer_id)
            .map(|messages| messages.value().clone())
            .ok_or_else(|| FetchError::NotFound(peer_id.clone()))
    }

    async fn subscribe(&self, sink: MessageSink) -> Result<SubscriptionHandle, SubscriptionError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .subscribe_failure
            .lock()
            .map_err(|_| SubscriptionError::Closed)?
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.insert(id, sink);
        debug!("Opened live subscription {}", id);
        Ok(SubscriptionHandle::new(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.subscribers.remove(&handle.id()).is_some() {
            debug!("Closed live subscription {}", handle.id());
        }
    }
}

/// Keeps a held history fetch pending until released.
#[derive(Debug)]
pub struct HistoryHold {
    release: oneshot::Sender<()>,
}

impl HistoryHold {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}
