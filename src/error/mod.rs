use thiserror::Error;

use crate::types::{MessageId, UserId};

/// History for a conversation could not be loaded.
///
/// Recoverable: selecting the same peer again retries the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error while fetching history: {0}")]
    Network(String),
    #[error("no conversation found with {0}")]
    NotFound(UserId),
}

/// The live feed could not be opened. Already loaded history stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("live feed unavailable: {0}")]
    Unavailable(String),
    #[error("message store is closed")]
    Closed,
}

/// A message broke the content invariant and was left out of the render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("message {message_id} has neither text nor image")]
    EmptyContent { message_id: MessageId },
}

/// Failures surfaced to the owner of a session controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error("conversation view has been closed")]
    Closed,
}
