// Fan-out of relay events to connected viewers
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::application::state_store::Snapshot;
use crate::domain::event::RelayEvent;

/// Per-viewer buffer depth. A viewer that falls this far behind loses its
/// oldest unread events rather than growing memory or blocking ingestion.
pub const EVENT_BUFFER: usize = 64;

/// A freshly connected viewer: its connect-time snapshot plus the event
/// stream that starts no earlier than that snapshot.
pub struct ViewerSession {
    pub id: u64,
    pub snapshot: Snapshot,
    pub events: broadcast::Receiver<RelayEvent>,
}

/// Fire-and-forget broadcaster over a bounded channel. Sends never block
/// and never fail the ingestion path; a send with no viewers connected is
/// simply dropped.
pub struct Broadcaster {
    tx: broadcast::Sender<RelayEvent>,
    next_viewer_id: AtomicU64,
    viewers: AtomicUsize,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            next_viewer_id: AtomicU64::new(1),
            viewers: AtomicUsize::new(0),
        }
    }

    /// Push an event to every connected viewer.
    pub fn broadcast(&self, event: RelayEvent) {
        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Event stream for the web layer's live-update transport.
    pub fn subscribe(&self) -> BroadcastStream<RelayEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Register a viewer. The receiver is created before the snapshot is
    /// taken by the caller, so the viewer misses nothing between the two.
    pub fn viewer_connect(&self, snapshot_fn: impl FnOnce() -> Snapshot) -> ViewerSession {
        let events = self.tx.subscribe();
        let snapshot = snapshot_fn();
        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        let count = self.viewers.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(viewer = id, connected = count, "viewer connected");
        ViewerSession {
            id,
            snapshot,
            events,
        }
    }

    pub fn viewer_disconnect(&self, id: u64) {
        // A repeated disconnect for the same viewer must not wrap the count.
        let _ = self
            .viewers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        debug!(viewer = id, connected = self.viewer_count(), "viewer disconnected");
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::Relaxed)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}
