//! The message store seam: history fetches and the live message feed.

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{FetchError, SubscriptionError};
use crate::types::{Message, UserId};

/// Callback invoked by the store for every live message.
pub type MessageSink = Arc<dyn Fn(Message) + Send + Sync>;

/// Proof of an open live subscription.
///
/// Not `Clone`: a handle can be given back to
/// [`MessageStore::unsubscribe`] exactly once.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "the subscription stays open until the handle is passed to `unsubscribe`"]
pub struct SubscriptionHandle {
    id: u64,
}

impl SubscriptionHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Messages exchanged with `peer_id`, oldest first.
    async fn fetch_history(&self, peer_id: &UserId) -> Result<Vec<Message>, FetchError>;

    /// Start delivering live messages for the session to `sink`.
    async fn subscribe(&self, sink: MessageSink) -> Result<SubscriptionHandle, SubscriptionError>;

    fn unsubscribe(&self, handle: SubscriptionHandle);
}
