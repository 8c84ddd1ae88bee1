//! Conversation state owned by the session controller.

use std::collections::HashSet;

use crate::error::FetchError;
use crate::types::{Message, MessageId, Peer};

/// Lifecycle phase of the conversation view.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Phase {
    /// No peer selected yet
    #[default]
    Idle,
    /// History requested, not yet arrived
    Loading,
    /// History loaded, following the live feed
    Ready,
    /// History could not be loaded; live messages are still shown
    Failed(FetchError),
    /// View closed, subscription released
    Closed,
}

impl Phase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Phase::Ready)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Phase::Closed)
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Phase::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Messages of one conversation in arrival order, unique by id.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` unless a message with the same id is already present.
    /// Returns whether it was appended.
    pub fn push(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Append every message not already present, keeping their order.
    /// Returns the number appended.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        messages
            .into_iter()
            .map(|message| self.push(message))
            .filter(|appended| *appended)
            .count()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// The most recent message; the scroll-anchor candidate.
    pub fn latest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Remove and return all messages, leaving the timeline empty.
    pub fn take(&mut self) -> Vec<Message> {
        self.ids.clear();
        std::mem::take(&mut self.messages)
    }
}

/// Everything the renderer needs to project the current conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub(crate) phase: Phase,
    pub(crate) peer: Option<Peer>,
    pub(crate) timeline: Timeline,
}

impl ConversationState {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn latest(&self) -> Option<&Message> {
        self.timeline.latest()
    }

    /// Start over for `peer`: empty timeline, waiting for history.
    pub(crate) fn begin_loading(&mut self, peer: Peer) {
        self.peer = Some(peer);
        self.timeline.clear();
        self.phase = Phase::Loading;
    }

    pub(crate) fn close(&mut self) {
        self.peer = None;
        self.timeline.clear();
        self.phase = Phase::Closed;
    }
}
