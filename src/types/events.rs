//! Events driving the conversation session controller.
//!
//! Background work (history fetches, subscription opens) and the store's live
//! feed report back through these events. The owner of a
//! [`SessionController`](crate::session::SessionController) receives them on
//! the channel returned from `SessionController::new` and feeds each one to
//! `handle_event` on its own loop.

use crate::error::{FetchError, SubscriptionError};
use crate::store::SubscriptionHandle;
use crate::types::{Message, UserId};

#[derive(Debug)]
pub enum SessionEvent {
    /// A history fetch finished, successfully or not
    HistoryLoaded {
        /// Selection epoch the fetch was issued for
        epoch: u64,
        peer_id: UserId,
        result: Result<Vec<Message>, FetchError>,
    },

    /// A live subscription open finished
    SubscriptionOpened {
        epoch: u64,
        result: Result<SubscriptionHandle, SubscriptionError>,
    },

    /// Message pushed by the live feed (boxed to reduce enum size)
    LiveMessage(Box<Message>),
}
