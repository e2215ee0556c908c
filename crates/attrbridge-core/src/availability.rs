// ── Node availability ──
//
// Two-state machine per node: Available (not in the set) or Unavailable
// (in the set). Transitions notify registered listeners; repeated marks are
// no-ops and do not notify.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use tracing::debug;

use crate::model::NodeId;

/// Receives availability transitions.
pub trait AvailabilityListener: Send + Sync {
    fn node_unavailable(&self, id: &NodeId);

    fn node_available(&self, _id: &NodeId) {}
}

/// Handle returned by [`AvailabilityTracker::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Tracks which nodes are currently Unavailable.
#[derive(Default)]
pub struct AvailabilityTracker {
    unavailable: DashSet<NodeId>,
    listeners: DashMap<ListenerId, Arc<dyn AvailabilityListener>>,
    next_listener: AtomicU64,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `id` to Unavailable. Returns `true` on a transition.
    pub fn mark_unavailable(&self, id: &NodeId) -> bool {
        if !self.unavailable.insert(id.clone()) {
            return false;
        }
        debug!(node = %id, "node unavailable");
        for listener in self.snapshot_listeners() {
            listener.node_unavailable(id);
        }
        true
    }

    /// Move `id` to Available. Returns `true` on a transition.
    pub fn mark_available(&self, id: &NodeId) -> bool {
        if self.unavailable.remove(id).is_none() {
            return false;
        }
        debug!(node = %id, "node available");
        for listener in self.snapshot_listeners() {
            listener.node_available(id);
        }
        true
    }

    pub fn is_unavailable(&self, id: &NodeId) -> bool {
        self.unavailable.contains(id)
    }

    pub fn unavailable_count(&self) -> usize {
        self.unavailable.len()
    }

    /// Unavailable node ids, sorted.
    pub fn unavailable_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.unavailable.iter().map(|id| id.clone()).collect();
        ids.sort();
        ids
    }

    // ── Listeners ───────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn AvailabilityListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // Listeners run outside the map's shard locks so they may call back
    // into the tracker.
    fn snapshot_listeners(&self) -> Vec<Arc<dyn AvailabilityListener>> {
        self.listeners.iter().map(|l| Arc::clone(l.value())).collect()
    }
}
