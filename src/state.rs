//! Lock-free state container with change notification
//!
//! `StateCell` holds an immutable snapshot behind an `ArcSwap`. Readers take a
//! cheap `Arc` clone and never block; writers publish a whole new snapshot with a
//! single atomic pointer store and then notify subscribers over a broadcast channel.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default broadcast capacity for change notifications
const NOTIFY_CAPACITY: usize = 64;

/// Snapshot container with read, atomic replace and subscribe
pub struct StateCell<T> {
    current: ArcSwap<T>,
    notify_tx: broadcast::Sender<Arc<T>>,
}

impl<T> StateCell<T> {
    /// Create a cell holding `initial`
    pub fn new(initial: T) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            current: ArcSwap::from_pointee(initial),
            notify_tx,
        }
    }

    /// Latest snapshot (non-blocking read)
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Publish a new snapshot and notify subscribers; returns the previous one
    pub fn replace(&self, next: Arc<T>) -> Arc<T> {
        let previous = self.current.swap(next.clone());
        // Best effort send - no receivers is not an error
        let _ = self.notify_tx.send(next);
        previous
    }

    /// Publish `next` unless `same(previous, next)` holds; returns whether it was published
    pub fn replace_unless(&self, next: Arc<T>, same: impl Fn(&T, &T) -> bool) -> bool {
        let previous = self.current.load();
        if same(&previous, &next) {
            return false;
        }
        self.replace(next);
        true
    }

    /// Subscribe to future snapshots
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.notify_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.notify_tx.receiver_count()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell")
            .field("current", &*self.current.load_full())
            .field("subscribers", &self.notify_tx.receiver_count())
            .finish()
    }
}
