//! Conversation session controller.
//!
//! Owns the lifecycle of "viewing the conversation with peer P" as an
//! explicit state machine:
//!
//! ```text
//! Idle ──select_peer──▶ Loading ──history──▶ Ready
//!                          ▲  │                │
//!                          │  └─fetch error─▶ Failed ──select same peer──┐
//!                          └──────────── select other peer ◀─────────────┘
//! any ──teardown──▶ Closed
//! ```
//!
//! Fetches and subscription opens run as spawned tasks. Their results, and
//! every live message, come back as [`SessionEvent`]s on the channel returned
//! from [`SessionController::new`]; the owner feeds them to
//! [`SessionController::handle_event`] on its own loop, so all state changes
//! happen in one place and in order.
//!
//! Each history request is tagged with an epoch. A result whose epoch is no
//! longer current belongs to a superseded selection and is dropped. The same
//! applies to subscription opens: a handle that lands after the view moved on
//! is released immediately, so at most one subscription is ever held.

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::conversation::{ConversationState, Phase};
use crate::error::{FetchError, SessionError, SubscriptionError};
use crate::format::TimestampFormatter;
use crate::identity::IdentityProvider;
use crate::scroll::{ScrollAnchor, ScrollBehavior, ScrollTarget};
use crate::store::{MessageSink, MessageStore, SubscriptionHandle};
use crate::types::{LocalUser, Message, MessageId, Peer, SessionEvent, UserId};
use crate::view::{ViewFrame, ViewRenderer};

/// Where the live subscription stands.
#[derive(Debug, Default)]
enum SubscriptionSlot {
    #[default]
    Detached,
    /// Open requested, result not yet delivered
    Opening,
    Active(SubscriptionHandle),
    Failed(SubscriptionError),
}

pub struct SessionController {
    store: Arc<dyn MessageStore>,
    identity: Arc<dyn IdentityProvider>,
    state: ConversationState,
    history_epoch: u64,
    subscription_epoch: u64,
    subscription: SubscriptionSlot,
    /// Live messages that arrived while history was still loading
    held_live: Vec<Message>,
    scroll: ScrollAnchor,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Create a controller and the receiver its events arrive on.
    pub fn new(
        store: Arc<dyn MessageStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            store,
            identity,
            state: ConversationState::default(),
            history_epoch: 0,
            subscription_epoch: 0,
            subscription: SubscriptionSlot::Detached,
            held_live: Vec::new(),
            scroll: ScrollAnchor::new(),
            events,
        };
        (controller, rx)
    }

    // ========== Accessors ==========

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn phase(&self) -> &Phase {
        self.state.phase()
    }

    pub fn local_user(&self) -> &LocalUser {
        self.identity.local_user()
    }

    pub fn has_live_subscription(&self) -> bool {
        matches!(self.subscription, SubscriptionSlot::Active(_))
    }

    pub fn subscription_error(&self) -> Option<&SubscriptionError> {
        match &self.subscription {
            SubscriptionSlot::Failed(error) => Some(error),
            _ => None,
        }
    }

    // ========== Actions ==========

    /// Show the conversation with `peer`.
    ///
    /// A different peer tears down the current conversation and starts a new
    /// one: live feed released, timeline emptied, history requested, live
    /// feed reopened. The same peer retries the history if the last fetch
    /// failed and reopens the live feed if it is down; otherwise it is a
    /// no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn select_peer(&mut self, peer: Peer) -> Result<(), SessionError> {
        if self.state.phase.is_closed() {
            return Err(SessionError::Closed);
        }

        let same_peer = self.state.peer.as_ref().is_some_and(|p| p.id == peer.id);
        if same_peer {
            let peer_id = peer.id.clone();
            // Keep the header current if the profile changed.
            self.state.peer = Some(peer);
            if matches!(self.state.phase, Phase::Failed(_)) {
                self.retry_history();
            } else if self.needs_subscription() {
                info!("Reopening live subscription for {}", peer_id);
                self.open_subscription();
            }
            return Ok(());
        }

        info!("Opening conversation with {}", peer.id);
        self.release_subscription();
        self.held_live.clear();
        self.scroll.reset();
        let peer_id = peer.id.clone();
        self.state.begin_loading(peer);
        self.request_history(peer_id);
        self.open_subscription();
        Ok(())
    }

    /// Close the view: release the live feed and drop all conversation state.
    ///
    /// Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        let slot = std::mem::take(&mut self.subscription);
        let store = Arc::clone(&self.store);
        // Release even if clearing the rest of the state unwinds.
        let _release = scopeguard::guard(slot, move |slot| release_slot(store.as_ref(), slot));

        self.subscription_epoch += 1;
        if self.state.phase.is_closed() {
            return;
        }
        info!("Closing conversation view");
        self.history_epoch += 1;
        self.held_live.clear();
        self.scroll.reset();
        self.state.close();
    }

    /// Apply one event from the session channel.
    ///
    /// Returns the failure the event carried, if it still concerns the
    /// current conversation. The state already reflects it.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::HistoryLoaded {
                epoch,
                peer_id,
                result,
            } => self.handle_history_loaded(epoch, peer_id, result),
            SessionEvent::SubscriptionOpened { epoch, result } => {
                self.handle_subscription_opened(epoch, result)
            }
            SessionEvent::LiveMessage(message) => {
                self.on_live_message(*message);
                Ok(())
            }
        }
    }

    /// Add a live message to the open conversation.
    ///
    /// Messages outside the conversation and repeated deliveries are ignored.
    /// While history is loading the message is held back and merged behind
    /// the history once it arrives.
    pub fn on_live_message(&mut self, message: Message) {
        let belongs = self
            .state
            .peer
            .as_ref()
            .is_some_and(|peer| message.is_between(&self.identity.local_user().id, &peer.id));
        if !belongs {
            debug!(
                "Ignoring live message {} outside the open conversation",
                message.id
            );
            return;
        }

        match self.state.phase {
            Phase::Loading => {
                if !self.held_live.iter().any(|held| held.id == message.id) {
                    self.held_live.push(message);
                }
            }
            Phase::Ready | Phase::Failed(_) => {
                if self.state.timeline.contains(&message.id) {
                    debug!("Ignoring duplicate delivery of message {}", message.id);
                    return;
                }
                self.state.timeline.push(message);
                self.scroll.request(ScrollBehavior::Smooth);
            }
            Phase::Idle | Phase::Closed => {}
        }
    }

    // ========== Rendering ==========

    /// Project the current state with `renderer`.
    pub fn render<F: TimestampFormatter>(&self, renderer: &ViewRenderer<F>) -> ViewFrame {
        renderer.project(&self.state, self.identity.local_user())
    }

    /// Report that `frame` has been committed to the display. Returns where
    /// to scroll, if a scroll was requested and the frame has an anchor.
    pub fn on_frame_committed(&mut self, frame: &ViewFrame) -> Option<ScrollTarget> {
        self.scroll.on_commit(frame)
    }

    /// Message the view last scrolled to in this conversation.
    pub fn scrolled_to(&self) -> Option<&MessageId> {
        self.scroll.anchored()
    }

    // ========== Internals ==========

    fn retry_history(&mut self) {
        let Some(peer_id) = self.state.peer.as_ref().map(|p| p.id.clone()) else {
            return;
        };
        info!("Retrying history for {}", peer_id);
        // Whatever arrived live goes back behind the history.
        self.held_live = self.state.timeline.take();
        self.state.phase = Phase::Loading;
        self.request_history(peer_id);
        if self.needs_subscription() {
            self.open_subscription();
        }
    }

    /// No live feed is attached and none is on its way.
    fn needs_subscription(&self) -> bool {
        matches!(
            self.subscription,
            SubscriptionSlot::Detached | SubscriptionSlot::Failed(_)
        )
    }

    fn request_history(&mut self, peer_id: UserId) {
        self.history_epoch += 1;
        let epoch = self.history_epoch;
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = store.fetch_history(&peer_id).await;
            // A closed channel means the controller is gone.
            let _ = events.send(SessionEvent::HistoryLoaded {
                epoch,
                peer_id,
                result,
            });
        });
    }

    fn open_subscription(&mut self) {
        self.subscription_epoch += 1;
        self.subscription = SubscriptionSlot::Opening;
        let epoch = self.subscription_epoch;
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        let live_events = self.events.clone();
        let sink: MessageSink = Arc::new(move |message: Message| {
            let _ = live_events.send(SessionEvent::LiveMessage(Box::new(message)));
        });

        tokio::spawn(async move {
            let result = store.subscribe(sink).await;
            if let Err(mpsc::error::SendError(SessionEvent::SubscriptionOpened {
                result: Ok(handle),
                ..
            })) = events.send(SessionEvent::SubscriptionOpened { epoch, result })
            {
                // Nobody left to own the handle.
                store.unsubscribe(handle);
            }
        });
    }

    fn release_subscription(&mut self) {
        let slot = std::mem::take(&mut self.subscription);
        // Any open still in flight is now stale and released on arrival.
        self.subscription_epoch += 1;
        release_slot(self.store.as_ref(), slot);
    }

    fn handle_history_loaded(
        &mut self,
        epoch: u64,
        peer_id: UserId,
        result: Result<Vec<Message>, FetchError>,
    ) -> Result<(), SessionError> {
        if epoch != self.history_epoch || !self.state.phase.is_loading() {
            debug!(
                "Discarding stale history for {} (epoch {}, current {})",
                peer_id, epoch, self.history_epoch
            );
            return Ok(());
        }

        let held = std::mem::take(&mut self.held_live);
        match result {
            Ok(history) => {
                let loaded = self.state.timeline.extend(history);
                let live = self.state.timeline.extend(held);
                self.state.phase = Phase::Ready;
                // An empty conversation has nothing to jump to.
                if loaded + live > 0 {
                    self.scroll.request(ScrollBehavior::Instant);
                }
                info!(
                    "Loaded {} messages with {} ({} live)",
                    loaded, peer_id, live
                );
                Ok(())
            }
            Err(error) => {
                warn!("History with {} unavailable: {}", peer_id, error);
                if self.state.timeline.extend(held) > 0 {
                    self.scroll.request(ScrollBehavior::Instant);
                }
                self.state.phase = Phase::Failed(error.clone());
                Err(error.into())
            }
        }
    }

    fn handle_subscription_opened(
        &mut self,
        epoch: u64,
        result: Result<SubscriptionHandle, SubscriptionError>,
    ) -> Result<(), SessionError> {
        let current = epoch == self.subscription_epoch
            && matches!(self.subscription, SubscriptionSlot::Opening);

        match result {
            Ok(handle) if current => {
                info!("Live subscription {} attached", handle.id());
                self.subscription = SubscriptionSlot::Active(handle);
                Ok(())
            }
            Ok(handle) => {
                debug!("Releasing superseded subscription {}", handle.id());
                self.store.unsubscribe(handle);
                Ok(())
            }
            Err(error) if current => {
                warn!("Live subscription failed: {}", error);
                self.subscription = SubscriptionSlot::Failed(error.clone());
                Err(error.into())
            }
            Err(error) => {
                debug!("Ignoring failure of superseded subscription: {}", error);
                Ok(())
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn release_slot(store: &dyn MessageStore, slot: SubscriptionSlot) {
    if let SubscriptionSlot::Active(handle) = slot {
        debug!("Releasing live subscription {}", handle.id());
        store.unsubscribe(handle);
    }
}
