use anyhow::{Context, Result, anyhow};
use chrono::{Local, Utc};
use clap::Parser;
use convo_view::format::TimestampFormatter;
use convo_view::view::{Alignment, Block, ViewBody};
use convo_view::{
    LocalUser, MemoryStore, Message, Peer, SessionController, UserId, ViewConfig, ViewFrame,
    ViewRenderer,
};
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Walks one conversation through the view: skeleton while history loads,
// the timeline once it arrives, then a few live messages.
//
// Usage:
//   cargo run                                   # built-in fixture, peer "bob"
//   cargo run -- --peer carol                   # a peer without history
//   cargo run -- -f chats.json -c view.json     # custom fixture and config
//   cargo run -- --live 5 --interval-ms 200     # more live traffic
//   cargo run -- --local-time                   # timestamps in local time

#[derive(Parser, Debug)]
#[command(version, about = "Drive a conversation view against an in-memory store")]
struct Args {
    /// Peer whose conversation is opened
    #[arg(short, long, default_value = "bob")]
    peer: String,

    /// JSON fixture with `local_user`, `peers` and `conversations`
    #[arg(short, long)]
    fixture: Option<PathBuf>,

    /// JSON view config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of live messages to simulate
    #[arg(short, long, default_value_t = 3)]
    live: usize,

    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Show timestamps in local time instead of UTC
    #[arg(long)]
    local_time: bool,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    local_user: LocalUser,
    peers: Vec<Peer>,
    /// History per peer id, oldest first
    #[serde(default)]
    conversations: HashMap<UserId, Vec<Message>>,
}

const BUILTIN_FIXTURE: &str = r#"{
  "local_user": { "_id": "alice", "fullName": "Alice", "profilePic": "/alice.png" },
  "peers": [
    { "_id": "bob", "fullName": "Bob", "profilePic": "/bob.png" },
    { "_id": "carol", "fullName": "Carol" }
  ],
  "conversations": {
    "bob": [
      { "_id": "m1", "senderId": "bob", "receiverId": "alice", "text": "hey, are you around?", "createdAt": "2024-05-01T09:12:00Z" },
      { "_id": "m2", "senderId": "alice", "receiverId": "bob", "text": "yes, what's up", "createdAt": "2024-05-01T09:13:30Z" },
      { "_id": "m3", "senderId": "bob", "receiverId": "alice", "image": "/uploads/whiteboard.jpg", "text": "look at this", "createdAt": "2024-05-01T09:15:02Z" }
    ]
  }
}"#;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ViewConfig::from_json(&raw).context("parsing view config")?
        }
        None => ViewConfig::default(),
    };
    if args.local_time {
        config.local_time = true;
    }
    let fixture = load_fixture(args.fixture.as_ref())?;

    let peer = fixture
        .peers
        .iter()
        .find(|peer| peer.id.as_str() == args.peer)
        .cloned()
        .ok_or_else(|| anyhow!("peer {} is not in the fixture", args.peer))?;

    let store = Arc::new(MemoryStore::new());
    for (peer_id, messages) in fixture.conversations {
        store.insert_history(peer_id, messages);
    }
    info!(
        "Loaded fixture: {} as local user, {} peers",
        fixture.local_user.id,
        fixture.peers.len()
    );

    let local = fixture.local_user.clone();
    let (controller, mut events) =
        SessionController::new(store.clone(), Arc::new(fixture.local_user));
    let mut controller = scopeguard::guard(controller, |mut controller| {
        controller.teardown();
        info!("Conversation view closed");
    });
    let renderer = ViewRenderer::from_config(&config);

    controller.select_peer(peer.clone())?;
    commit(&mut controller, &renderer);

    let mut feeder = {
        let store = store.clone();
        let interval = Duration::from_millis(args.interval_ms);
        let count = args.live;
        let (local_id, peer_id) = (local.id.clone(), peer.id.clone());
        tokio::spawn(async move {
            for i in 0..count {
                tokio::time::sleep(interval).await;
                let (from, to) = if i % 2 == 0 {
                    (&peer_id, &local_id)
                } else {
                    (&local_id, &peer_id)
                };
                let id = format!("live-{}", i + 1);
                let message = Message::new(id.as_str(), from.clone(), to.clone(), Utc::now())
                    .with_text(format!("live message #{}", i + 1));
                let reached = store.push(message);
                info!("Pushed live message #{} to {} subscriber(s)", i + 1, reached);
            }
        })
    };

    let mut feeder_done = false;
    while !feeder_done || controller.phase().is_loading() {
        tokio::select! {
            Some(event) = events.recv() => {
                if let Err(e) = controller.handle_event(event) {
                    warn!("Conversation with {}: {}", peer.id, e);
                }
                commit(&mut controller, &renderer);
            }
            result = &mut feeder, if !feeder_done => {
                result.context("live feeder panicked")?;
                feeder_done = true;
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        if let Err(e) = controller.handle_event(event) {
            warn!("Conversation with {}: {}", peer.id, e);
        }
        commit(&mut controller, &renderer);
    }

    Ok(())
}

fn load_fixture(path: Option<&PathBuf>) -> Result<Fixture> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?,
        None => BUILTIN_FIXTURE.to_string(),
    };
    serde_json::from_str(&raw).context("parsing fixture")
}

/// Render the current state, "commit" it by logging it, then apply any
/// scroll the commit releases.
fn commit<F: TimestampFormatter>(controller: &mut SessionController, renderer: &ViewRenderer<F>) {
    let frame = controller.render(renderer);
    log_frame(&frame);
    if let Some(target) = controller.on_frame_committed(&frame) {
        info!("Scroll to {} ({:?})", target.message_id, target.behavior);
    }
}

fn log_frame(frame: &ViewFrame) {
    if let Some(header) = &frame.header {
        info!("== {} ({}) ==", header.name, header.avatar);
    }
    match &frame.body {
        ViewBody::NoConversation => info!("No conversation selected"),
        ViewBody::Closed => info!("Conversation closed"),
        ViewBody::Skeleton(skeleton) => {
            info!("Loading: {} placeholder bubbles", skeleton.len());
        }
        ViewBody::Timeline(timeline) => {
            for entry in &timeline.entries {
                let side = match entry.alignment {
                    Alignment::Outbound => ">>",
                    Alignment::Inbound => "<<",
                };
                let content: Vec<String> = entry
                    .blocks
                    .iter()
                    .map(|block| match block {
                        Block::Image(src) => format!("[image {}]", src),
                        Block::Text(text) => text.clone(),
                    })
                    .collect();
                info!("{} {} {}", side, entry.timestamp, content.join(" "));
            }
            if timeline.is_empty() {
                info!("No messages yet");
            }
        }
        ViewBody::Unavailable { error, timeline } => {
            warn!(
                "History unavailable ({}), {} live message(s) shown",
                error,
                timeline.len()
            );
        }
    }
}
