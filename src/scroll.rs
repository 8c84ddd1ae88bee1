//! Scroll-to-latest as a deferred effect.
//!
//! State changes only *request* a scroll. The request is fulfilled once a
//! frame carrying an anchor has been committed to the display, so the scroll
//! always targets the layout the user actually sees.

use crate::types::MessageId;
use crate::view::ViewFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Jump without animation (initial history load)
    Instant,
    /// Animate (new live message)
    Smooth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTarget {
    pub message_id: MessageId,
    pub behavior: ScrollBehavior,
}

#[derive(Debug, Default)]
pub struct ScrollAnchor {
    pending: Option<ScrollBehavior>,
    anchored: Option<MessageId>,
}

impl ScrollAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a scroll after the next committed frame. An instant request
    /// is not downgraded by a later smooth one.
    pub fn request(&mut self, behavior: ScrollBehavior) {
        self.pending = match self.pending {
            Some(ScrollBehavior::Instant) => Some(ScrollBehavior::Instant),
            _ => Some(behavior),
        };
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.anchored = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Message the view was last scrolled to.
    pub fn anchored(&self) -> Option<&MessageId> {
        self.anchored.as_ref()
    }

    /// Called after `frame` is on screen. Frames without an anchor (skeleton,
    /// empty timeline) leave the request pending.
    pub fn on_commit(&mut self, frame: &ViewFrame) -> Option<ScrollTarget> {
        let anchor = frame.anchor()?;
        let behavior = self.pending.take()?;
        self.anchored = Some(anchor.clone());
        Some(ScrollTarget {
            message_id: anchor.clone(),
            behavior,
        })
    }
}
