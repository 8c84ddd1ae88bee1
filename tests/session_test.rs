use std::sync::Arc;

use chrono::{TimeZone, Utc};
use convo_view::scroll::ScrollBehavior;
use convo_view::view::ViewBody;
use convo_view::{
    FetchError, LocalUser, MemoryStore, Message, MessageId, Peer, SessionController,
    SessionError, SessionEvent, SubscriptionError, ViewRenderer,
};
use tokio::sync::mpsc::UnboundedReceiver;

fn alice() -> LocalUser {
    LocalUser::new("alice", "Alice").with_avatar("/alice.png")
}

fn bob() -> Peer {
    Peer::new("bob", "Bob").with_avatar("/bob.png")
}

fn carol() -> Peer {
    Peer::new("carol", "Carol")
}

fn msg(id: &str, from: &str, to: &str, secs: i64) -> Message {
    Message::new(id, from, to, Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
        .with_text(format!("text of {}", id))
}

fn bob_history() -> Vec<Message> {
    vec![
        msg("m1", "bob", "alice", 0),
        msg("m2", "alice", "bob", 60),
    ]
}

fn setup(store: MemoryStore) -> (Arc<MemoryStore>, SessionController, UnboundedReceiver<SessionEvent>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(store);
    let (controller, events) = SessionController::new(store.clone(), Arc::new(alice()));
    (store, controller, events)
}

/// Let spawned store tasks run and apply every event they produced.
async fn settle(
    controller: &mut SessionController,
    events: &mut UnboundedReceiver<SessionEvent>,
) -> Vec<SessionError> {
    let mut errors = Vec::new();
    for _ in 0..8 {
        tokio::task::yield_now().await;
        while let Ok(event) = events.try_recv() {
            if let Err(e) = controller.handle_event(event) {
                errors.push(e);
            }
        }
    }
    errors
}

fn timeline_ids(controller: &SessionController) -> Vec<&str> {
    controller
        .state()
        .timeline()
        .iter()
        .map(|m| m.id.as_str())
        .collect()
}

#[tokio::test]
async fn test_select_peer_loads_history_and_subscribes() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));

    controller.select_peer(bob()).unwrap();
    assert!(controller.phase().is_loading());
    assert!(controller.render(&ViewRenderer::default()).is_loading());

    let errors = settle(&mut controller, &mut events).await;
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2"]);
    assert!(controller.has_live_subscription());
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn test_live_messages_during_load_follow_history_once() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));
    let hold = store.hold_history("bob");

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    assert!(controller.has_live_subscription());

    store.push(msg("m3", "bob", "alice", 120));
    // Same message as the last history entry, delivered live as well.
    store.push(msg("m2", "alice", "bob", 60));
    store.push(msg("m3", "bob", "alice", 120));
    settle(&mut controller, &mut events).await;
    assert!(controller.phase().is_loading());
    assert!(controller.state().timeline().is_empty());

    hold.release();
    settle(&mut controller, &mut events).await;
    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_switching_peer_discards_stale_history() {
    let store = MemoryStore::new()
        .with_history("bob", bob_history())
        .with_history("carol", vec![msg("c1", "carol", "alice", 0)]);
    let (store, mut controller, mut events) = setup(store);
    let hold = store.hold_history("bob");

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    controller.select_peer(carol()).unwrap();
    settle(&mut controller, &mut events).await;
    assert_eq!(timeline_ids(&controller), vec!["c1"]);

    hold.release();
    settle(&mut controller, &mut events).await;

    assert!(controller.phase().is_ready());
    assert_eq!(controller.state().peer().map(|p| p.id.as_str()), Some("carol"));
    assert_eq!(timeline_ids(&controller), vec!["c1"]);
    // Bob's subscription was released, carol's is the only one left.
    assert_eq!(store.subscribe_calls(), 2);
    assert_eq!(store.unsubscribe_calls(), 1);
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn test_live_message_for_previous_peer_is_ignored() {
    let store = MemoryStore::new()
        .with_history("bob", bob_history())
        .with_history("carol", vec![]);
    let (store, mut controller, mut events) = setup(store);

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    controller.select_peer(carol()).unwrap();
    settle(&mut controller, &mut events).await;

    store.push(msg("m9", "bob", "alice", 300));
    store.push(msg("x1", "bob", "carol", 301));
    settle(&mut controller, &mut events).await;
    assert!(controller.state().timeline().is_empty());

    store.push(msg("c2", "alice", "carol", 302));
    settle(&mut controller, &mut events).await;
    assert_eq!(timeline_ids(&controller), vec!["c2"]);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;

    controller.teardown();
    controller.teardown();

    assert!(controller.phase().is_closed());
    assert!(controller.state().timeline().is_empty());
    assert!(!controller.has_live_subscription());
    assert_eq!(store.unsubscribe_calls(), 1);
    assert_eq!(store.subscriber_count(), 0);

    let frame = controller.render(&ViewRenderer::default());
    assert_eq!(frame.body, ViewBody::Closed);
    assert!(!frame.composer_available);
}

#[tokio::test]
async fn test_teardown_before_subscription_lands_releases_it() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));

    controller.select_peer(bob()).unwrap();
    controller.teardown();

    let errors = settle(&mut controller, &mut events).await;
    assert!(errors.is_empty());
    assert!(controller.phase().is_closed());
    assert!(controller.state().timeline().is_empty());
    assert_eq!(store.subscribe_calls(), 1);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_select_after_teardown_is_rejected() {
    let (store, mut controller, _events) = setup(MemoryStore::new());

    controller.teardown();
    assert_eq!(controller.select_peer(bob()), Err(SessionError::Closed));
    assert_eq!(store.subscribe_calls(), 0);
}

#[tokio::test]
async fn test_fetch_failure_keeps_live_feed_and_retries() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));
    let offline = FetchError::Network("offline".into());
    store.fail_next_fetch("bob", offline.clone());

    controller.select_peer(bob()).unwrap();
    let errors = settle(&mut controller, &mut events).await;
    assert_eq!(errors, vec![SessionError::Fetch(offline.clone())]);
    assert_eq!(controller.phase().error(), Some(&offline));
    assert!(controller.has_live_subscription());

    store.push(msg("m9", "bob", "alice", 300));
    settle(&mut controller, &mut events).await;

    let frame = controller.render(&ViewRenderer::default());
    match &frame.body {
        ViewBody::Unavailable { error, timeline } => {
            assert_eq!(error, &offline);
            assert_eq!(timeline.len(), 1);
        }
        other => panic!("expected unavailable body, got {:?}", other),
    }
    assert!(frame.composer_available);

    // Selecting the same peer again retries the fetch.
    controller.select_peer(bob()).unwrap();
    assert!(controller.phase().is_loading());
    let errors = settle(&mut controller, &mut events).await;
    assert!(errors.is_empty());
    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2", "m9"]);
    assert_eq!(store.subscribe_calls(), 1);
}

#[tokio::test]
async fn test_unknown_peer_fails_with_not_found() {
    let (_store, mut controller, mut events) = setup(MemoryStore::new());

    controller.select_peer(carol()).unwrap();
    let errors = settle(&mut controller, &mut events).await;

    assert_eq!(
        errors,
        vec![SessionError::Fetch(FetchError::NotFound("carol".into()))]
    );
    assert!(matches!(controller.phase().error(), Some(FetchError::NotFound(_))));
}

#[tokio::test]
async fn test_subscription_failure_keeps_history() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));
    let down = SubscriptionError::Unavailable("feed down".into());
    store.fail_subscriptions(Some(down.clone()));

    controller.select_peer(bob()).unwrap();
    let errors = settle(&mut controller, &mut events).await;

    assert_eq!(errors, vec![SessionError::Subscription(down.clone())]);
    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2"]);
    assert!(!controller.has_live_subscription());
    assert_eq!(controller.subscription_error(), Some(&down));
}

#[tokio::test]
async fn test_reselecting_peer_reopens_failed_subscription() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));
    store.fail_subscriptions(Some(SubscriptionError::Unavailable("feed down".into())));

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    assert!(controller.phase().is_ready());
    assert!(!controller.has_live_subscription());

    store.fail_subscriptions(None);
    controller.select_peer(bob()).unwrap();
    let errors = settle(&mut controller, &mut events).await;
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    assert!(controller.has_live_subscription());
    assert_eq!(controller.subscription_error(), None);
    assert_eq!(store.subscribe_calls(), 2);

    assert_eq!(store.push(msg("m3", "bob", "alice", 120)), 1);
    settle(&mut controller, &mut events).await;
    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_live_duplicates_of_history_never_repeat() {
    fn live(id: &str) -> Message {
        match id {
            "m2" => msg("m2", "alice", "bob", 60),
            _ => msg(id, "bob", "alice", 120),
        }
    }

    // (pushed while history is loading, pushed once ready)
    let interleavings: [(&[&str], &[&str]); 6] = [
        (&["m2", "m3"], &[]),
        (&["m3", "m2"], &[]),
        (&["m2"], &["m3"]),
        (&["m3"], &["m2"]),
        (&[], &["m2", "m3", "m2"]),
        (&["m3"], &["m3", "m2"]),
    ];

    for (while_loading, once_ready) in interleavings {
        let (store, mut controller, mut events) =
            setup(MemoryStore::new().with_history("bob", bob_history()));
        let hold = store.hold_history("bob");

        controller.select_peer(bob()).unwrap();
        settle(&mut controller, &mut events).await;
        for id in while_loading {
            store.push(live(id));
        }
        settle(&mut controller, &mut events).await;

        hold.release();
        settle(&mut controller, &mut events).await;
        assert!(controller.phase().is_ready());
        for id in once_ready {
            store.push(live(id));
        }
        settle(&mut controller, &mut events).await;

        assert_eq!(
            timeline_ids(&controller),
            vec!["m1", "m2", "m3"],
            "pushed {:?} while loading, {:?} once ready",
            while_loading,
            once_ready
        );
    }
}

#[tokio::test]
async fn test_reselecting_ready_peer_is_a_no_op() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    store.push(msg("m3", "bob", "alice", 120));
    settle(&mut controller, &mut events).await;

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;

    assert!(controller.phase().is_ready());
    assert_eq!(timeline_ids(&controller), vec!["m1", "m2", "m3"]);
    assert_eq!(store.subscribe_calls(), 1);
    assert_eq!(store.unsubscribe_calls(), 0);
}

#[tokio::test]
async fn test_scroll_targets_follow_committed_frames() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));
    let renderer = ViewRenderer::default();

    controller.select_peer(bob()).unwrap();
    let skeleton = controller.render(&renderer);
    assert!(skeleton.is_loading());
    assert_eq!(controller.on_frame_committed(&skeleton), None);

    settle(&mut controller, &mut events).await;
    let frame = controller.render(&renderer);
    let target = controller.on_frame_committed(&frame).unwrap();
    assert_eq!(target.message_id, MessageId::new("m2"));
    assert_eq!(target.behavior, ScrollBehavior::Instant);
    assert_eq!(controller.scrolled_to(), Some(&MessageId::new("m2")));

    // Nothing new: committing again does not scroll.
    let frame = controller.render(&renderer);
    assert_eq!(controller.on_frame_committed(&frame), None);

    store.push(msg("m3", "bob", "alice", 120));
    settle(&mut controller, &mut events).await;
    let frame = controller.render(&renderer);
    let target = controller.on_frame_committed(&frame).unwrap();
    assert_eq!(target.message_id, MessageId::new("m3"));
    assert_eq!(target.behavior, ScrollBehavior::Smooth);
    assert_eq!(controller.scrolled_to(), Some(&MessageId::new("m3")));
}

#[tokio::test]
async fn test_empty_history_requests_no_scroll_target() {
    let (_store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("carol", vec![]));
    let renderer = ViewRenderer::default();

    controller.select_peer(carol()).unwrap();
    settle(&mut controller, &mut events).await;

    let frame = controller.render(&renderer);
    assert_eq!(frame.anchor(), None);
    assert_eq!(controller.on_frame_committed(&frame), None);
}

#[tokio::test]
async fn test_first_live_message_after_empty_history_scrolls_smoothly() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("carol", vec![]));
    let renderer = ViewRenderer::default();

    controller.select_peer(carol()).unwrap();
    settle(&mut controller, &mut events).await;
    let frame = controller.render(&renderer);
    assert_eq!(controller.on_frame_committed(&frame), None);

    store.push(msg("c1", "carol", "alice", 10));
    settle(&mut controller, &mut events).await;

    let frame = controller.render(&renderer);
    let target = controller.on_frame_committed(&frame).unwrap();
    assert_eq!(target.message_id, MessageId::new("c1"));
    assert_eq!(target.behavior, ScrollBehavior::Smooth);
}

#[tokio::test]
async fn test_dropping_controller_releases_subscription() {
    let (store, mut controller, mut events) =
        setup(MemoryStore::new().with_history("bob", bob_history()));

    controller.select_peer(bob()).unwrap();
    settle(&mut controller, &mut events).await;
    assert_eq!(store.subscriber_count(), 1);

    drop(controller);
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(store.unsubscribe_calls(), 1);
}
