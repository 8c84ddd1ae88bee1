//! What the conversation view shows for a given state.
//!
//! - `timeline`: bubbles for the loaded messages
//! - `skeleton`: placeholder while history loads
//!
//! [`ViewRenderer::project`] combines both into a [`ViewFrame`], adding the
//! header and the composer slot that stays available below the timeline.

mod skeleton;
mod timeline;

pub use skeleton::Skeleton;
pub use timeline::{Block, RenderEntry, RenderedTimeline, TimelineRenderer};

use crate::config::ViewConfig;
use crate::conversation::{ConversationState, Phase};
use crate::error::FetchError;
use crate::format::{ClockFormatter, TimestampFormatter};
use crate::types::{LocalUser, MessageId, Peer, UserId};

/// Side of the view a bubble sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Sent by the local user
    Outbound,
    /// Sent by the peer
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHeader {
    pub peer_id: UserId,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewBody {
    /// No peer selected
    NoConversation,
    Skeleton(Skeleton),
    Timeline(RenderedTimeline),
    /// History failed to load; whatever arrived live is still shown
    Unavailable {
        error: FetchError,
        timeline: RenderedTimeline,
    },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFrame {
    pub header: Option<PeerHeader>,
    pub body: ViewBody,
    /// Whether the composer is shown below the body
    pub composer_available: bool,
}

impl ViewFrame {
    fn without_conversation(body: ViewBody) -> Self {
        Self {
            header: None,
            body,
            composer_available: false,
        }
    }

    pub fn timeline(&self) -> Option<&RenderedTimeline> {
        match &self.body {
            ViewBody::Timeline(timeline) | ViewBody::Unavailable { timeline, .. } => Some(timeline),
            _ => None,
        }
    }

    /// Message to bring into view once this frame is committed.
    pub fn anchor(&self) -> Option<&MessageId> {
        self.timeline().and_then(RenderedTimeline::anchor)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.body, ViewBody::Skeleton(_))
    }
}

pub struct ViewRenderer<F = ClockFormatter> {
    timeline: TimelineRenderer<F>,
    skeleton: Skeleton,
}

impl ViewRenderer<ClockFormatter> {
    pub fn from_config(config: &ViewConfig) -> Self {
        let formatter = if config.local_time {
            ClockFormatter::local(config.time_pattern.clone())
        } else {
            ClockFormatter::new(config.time_pattern.clone())
        };
        let timeline =
            TimelineRenderer::new(formatter).with_default_avatar(config.default_avatar.clone());
        Self {
            timeline,
            skeleton: Skeleton::new(config.skeleton_rows),
        }
    }
}

impl Default for ViewRenderer<ClockFormatter> {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl<F: TimestampFormatter> ViewRenderer<F> {
    pub fn new(timeline: TimelineRenderer<F>, skeleton: Skeleton) -> Self {
        Self { timeline, skeleton }
    }

    pub fn timeline_renderer(&self) -> &TimelineRenderer<F> {
        &self.timeline
    }

    /// Project `state` into a frame. While loading, the timeline renderer is
    /// bypassed entirely and only the skeleton is produced.
    pub fn project(&self, state: &ConversationState, local: &LocalUser) -> ViewFrame {
        let peer = match (state.phase(), state.peer()) {
            (Phase::Closed, _) => return ViewFrame::without_conversation(ViewBody::Closed),
            (Phase::Idle, _) | (_, None) => {
                return ViewFrame::without_conversation(ViewBody::NoConversation);
            }
            (_, Some(peer)) => peer,
        };

        let body = match state.phase() {
            Phase::Loading => ViewBody::Skeleton(self.skeleton.clone()),
            Phase::Failed(error) => ViewBody::Unavailable {
                error: error.clone(),
                timeline: self.render_timeline(state, local, peer),
            },
            _ => ViewBody::Timeline(self.render_timeline(state, local, peer)),
        };

        ViewFrame {
            header: Some(self.header(peer)),
            body,
            composer_available: true,
        }
    }

    fn render_timeline(
        &self,
        state: &ConversationState,
        local: &LocalUser,
        peer: &Peer,
    ) -> RenderedTimeline {
        self.timeline
            .render(state.timeline().as_slice(), local, peer)
    }

    fn header(&self, peer: &Peer) -> PeerHeader {
        PeerHeader {
            peer_id: peer.id.clone(),
            name: peer.display_name().to_string(),
            avatar: peer
                .avatar()
                .unwrap_or(self.timeline.default_avatar())
                .to_string(),
        }
    }
}
