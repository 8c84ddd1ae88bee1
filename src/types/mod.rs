//! Core data types shared by the session controller and the renderer.

mod events;
mod message;
mod peer;

pub use events::SessionEvent;
pub use message::{Message, MessageId};
pub use peer::{LocalUser, Peer, UserId};
