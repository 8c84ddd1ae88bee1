//! Projection of an ordered message collection into chat bubbles.

use log::warn;

use super::Alignment;
use crate::config::DEFAULT_AVATAR;
use crate::error::ContractViolation;
use crate::format::{ClockFormatter, TimestampFormatter};
use crate::types::{LocalUser, Message, MessageId, Peer};

/// Content of a bubble, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Image(String),
    Text(String),
}

/// One rendered bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEntry {
    pub message_id: MessageId,
    pub alignment: Alignment,
    pub avatar: String,
    /// Image first, then text; only what the message carries
    pub blocks: Vec<Block>,
    pub timestamp: String,
    /// Set on the last entry only
    pub is_anchor: bool,
}

impl RenderEntry {
    pub fn is_outbound(&self) -> bool {
        self.alignment == Alignment::Outbound
    }

    pub fn image(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Image(src) => Some(src.as_str()),
            Block::Text(_) => None,
        })
    }

    pub fn text(&self) -> Option<&str> {
        self.blocks.iter().find_map(|block| match block {
            Block::Text(text) => Some(text.as_str()),
            Block::Image(_) => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTimeline {
    pub entries: Vec<RenderEntry>,
    /// Messages left out because they broke the content invariant
    pub violations: Vec<ContractViolation>,
}

impl RenderedTimeline {
    pub fn anchor(&self) -> Option<&MessageId> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.is_anchor)
            .map(|entry| &entry.message_id)
    }

    pub fn ids(&self) -> Vec<&MessageId> {
        self.entries.iter().map(|entry| &entry.message_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct TimelineRenderer<F = ClockFormatter> {
    formatter: F,
    default_avatar: String,
}

impl Default for TimelineRenderer<ClockFormatter> {
    fn default() -> Self {
        Self::new(ClockFormatter::default())
    }
}

impl<F: TimestampFormatter> TimelineRenderer<F> {
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            default_avatar: DEFAULT_AVATAR.to_string(),
        }
    }

    pub fn with_default_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.default_avatar = avatar.into();
        self
    }

    pub fn default_avatar(&self) -> &str {
        &self.default_avatar
    }

    /// Render `messages` in the given order. Invalid messages are skipped and
    /// reported; the last rendered entry becomes the scroll anchor.
    pub fn render(&self, messages: &[Message], local: &LocalUser, peer: &Peer) -> RenderedTimeline {
        let mut rendered = RenderedTimeline {
            entries: Vec::with_capacity(messages.len()),
            violations: Vec::new(),
        };

        for message in messages {
            if let Err(violation) = message.validate() {
                warn!("Skipping message in conversation with {}: {}", peer.id, violation);
                rendered.violations.push(violation);
                continue;
            }
            rendered.entries.push(self.render_entry(message, local, peer));
        }

        if let Some(last) = rendered.entries.last_mut() {
            last.is_anchor = true;
        }
        rendered
    }

    fn render_entry(&self, message: &Message, local: &LocalUser, peer: &Peer) -> RenderEntry {
        let (alignment, avatar) = if message.is_from(&local.id) {
            (Alignment::Outbound, local.avatar())
        } else {
            (Alignment::Inbound, peer.avatar())
        };

        let mut blocks = Vec::with_capacity(2);
        if let Some(image) = message.image() {
            blocks.push(Block::Image(image.to_string()));
        }
        if let Some(text) = message.text() {
            blocks.push(Block::Text(text.to_string()));
        }

        RenderEntry {
            message_id: message.id.clone(),
            alignment,
            avatar: avatar.unwrap_or(self.default_avatar.as_str()).to_string(),
            blocks,
            timestamp: self.formatter.format(&message.created_at),
            is_anchor: false,
        }
    }
}
