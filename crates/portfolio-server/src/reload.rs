//! Development hot reload: a client registry, a debouncer, and a file
//! watcher that ties them together.
//!
//! # Flow
//!
//! - The `/ws` route registers each upgraded socket with [`ReloadRegistry`]
//! - [`spawn_watcher`] watches the content directory with `notify`
//! - A qualifying event moves the [`Debouncer`] from idle to pending; after
//!   [`RELOAD_DELAY`] every client is sent `reload` and the debouncer goes
//!   back to idle. Events while pending do not restart the timer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Delay between the first qualifying file event and the broadcast.
pub const RELOAD_DELAY: Duration = Duration::from_millis(100);

/// Extensions whose changes trigger a reload.
pub const WATCHED_EXTENSIONS: &[&str] = &[
    ".html", ".css", ".js", ".json", ".png", ".jpg", ".jpeg", ".svg",
];

/// Path fragments that never trigger a reload.
pub const IGNORED_FRAGMENTS: &[&str] = &[".git", "node_modules", ".DS_Store"];

/// Text frame sent to clients.
pub const RELOAD_MESSAGE: &str = "reload";

/// Identifier of a connected reload client.
pub type ClientId = Uuid;

/// Instruction delivered to a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSignal {
    Reload,
}

// ============================================================================
// Registry
// ============================================================================

/// The set of connected reload clients.
#[derive(Debug, Default)]
pub struct ReloadRegistry {
    clients: RwLock<HashMap<ClientId, mpsc::UnboundedSender<ReloadSignal>>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client; it receives signals on the returned channel.
    pub async fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<ReloadSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let mut clients = self.clients.write().await;
        clients.insert(id, tx);
        tracing::info!(client_id = %id, clients = clients.len(), "Hot reload client connected");
        (id, rx)
    }

    pub async fn remove(&self, id: ClientId) {
        if self.clients.write().await.remove(&id).is_some() {
            tracing::debug!(client_id = %id, "Hot reload client disconnected");
        }
    }

    /// Send `reload` to every client and return how many received it.
    ///
    /// Membership is snapshotted first; clients whose channel is closed
    /// are removed afterwards.
    pub async fn broadcast(&self) -> usize {
        let snapshot: Vec<(ClientId, mpsc::UnboundedSender<ReloadSignal>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(ReloadSignal::Reload).is_ok() {
                delivered += 1;
            } else {
                closed.push(id);
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write().await;
            for id in &closed {
                clients.remove(id);
            }
            tracing::debug!(pruned = closed.len(), "Pruned closed reload clients");
        }
        delivered
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

// ============================================================================
// Debouncer
// ============================================================================

/// Debouncer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceState {
    /// No recent qualifying event.
    #[default]
    Idle,
    /// An event was seen and a broadcast is scheduled.
    Pending,
}

/// Two-state debounce: at least one reload per burst of events.
#[derive(Debug, Default)]
pub struct Debouncer {
    state: DebounceState,
}

impl Debouncer {
    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Record a qualifying event. Returns `true` when a broadcast should be
    /// scheduled, which only happens on the idle to pending transition.
    pub fn observe(&mut self) -> bool {
        match self.state {
            DebounceState::Idle => {
                self.state = DebounceState::Pending;
                true
            }
            DebounceState::Pending => false,
        }
    }

    /// The scheduled broadcast ran.
    pub fn fire(&mut self) {
        self.state = DebounceState::Idle;
    }
}

// ============================================================================
// File Watching
// ============================================================================

fn is_watched_path(path: &Path) -> bool {
    let path = path.to_string_lossy();
    WATCHED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        && !IGNORED_FRAGMENTS.iter().any(|frag| path.contains(frag))
}

/// Whether a file system event should trigger a reload.
pub fn is_reload_trigger(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| is_watched_path(p))
}

/// Consume file events and broadcast debounced reloads until the channel
/// closes.
pub async fn run_reload_loop(
    mut events: mpsc::UnboundedReceiver<Event>,
    registry: Arc<ReloadRegistry>,
    delay: Duration,
) {
    let mut debouncer = Debouncer::default();

    while let Some(event) = events.recv().await {
        if !is_reload_trigger(&event) || !debouncer.observe() {
            continue;
        }
        tracing::info!(paths = ?event.paths, "File changed, scheduling reload");

        let deadline = tokio::time::sleep(delay);
        tokio::pin!(deadline);
        let mut open = true;
        while open {
            tokio::select! {
                _ = &mut deadline => break,
                next = events.recv() => match next {
                    Some(event) => {
                        if is_reload_trigger(&event) {
                            debouncer.observe();
                        }
                    }
                    None => open = false,
                },
            }
        }
        if !open {
            deadline.await;
        }

        let delivered = registry.broadcast().await;
        debouncer.fire();
        tracing::debug!(delivered, "Reload broadcast sent");

        if !open {
            break;
        }
    }
}

/// A running watcher; dropping it stops watching.
pub struct ReloadWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ReloadWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for ReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadWatcher").finish_non_exhaustive()
    }
}

/// Watch `root` recursively and broadcast reloads through `registry`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_watcher(root: &Path, registry: Arc<ReloadRegistry>) -> notify::Result<ReloadWatcher> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) => {
                // The loop is gone only during shutdown.
                let _ = tx.send(event);
            }
            Err(error) => tracing::warn!(%error, "File watcher error"),
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "Watching files for hot reload");

    let task = tokio::spawn(run_reload_loop(rx, registry, RELOAD_DELAY));
    Ok(ReloadWatcher {
        _watcher: watcher,
        task,
    })
}
