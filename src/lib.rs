pub mod config;
pub mod conversation;
pub mod error;
pub mod format;
pub mod identity;
pub mod scroll;
pub mod session;
pub mod store;
pub mod types;
pub mod view;

pub use config::ViewConfig;
pub use conversation::{ConversationState, Phase, Timeline};
pub use error::{ContractViolation, FetchError, SessionError, SubscriptionError};
pub use session::SessionController;
pub use store::memory::MemoryStore;
pub use store::{MessageStore, SubscriptionHandle};
pub use types::{LocalUser, Message, MessageId, Peer, SessionEvent, UserId};
pub use view::{ViewFrame, ViewRenderer};
