//! Current-network resolution
//!
//! The current network is never stored. It is derived from the selected id and the
//! registry snapshot, and republished only when the resolved record changes
//! identity. Because registry mutations are copy-on-write, an untouched record keeps
//! its `Arc` across snapshots and resolving it again is a no-op for subscribers.

use crate::guid::Guid;
use crate::state::StateCell;
use crate::types::NetworkRecord;
use std::sync::Arc;
use tracing::debug;

/// Find the record whose id matches `selected`
pub fn resolve<'a>(
    networks: &'a [Arc<NetworkRecord>],
    selected: Option<&Guid>,
) -> Option<&'a Arc<NetworkRecord>> {
    let selected = selected?;
    networks.iter().find(|n| &n.id == selected)
}

/// Keep a selection that still resolves, otherwise fall back to the first record
pub fn repair(networks: &[Arc<NetworkRecord>], selected: Option<&Guid>) -> Option<Guid> {
    match resolve(networks, selected) {
        Some(found) => Some(found.id.clone()),
        None => networks.first().map(|n| n.id.clone()),
    }
}

/// Memoized current-network projection
#[derive(Debug)]
pub struct CurrentNetwork {
    cell: StateCell<Option<Arc<NetworkRecord>>>,
}

impl CurrentNetwork {
    pub fn new() -> Self {
        Self {
            cell: StateCell::new(None),
        }
    }

    /// Latest resolved record
    pub fn get(&self) -> Option<Arc<NetworkRecord>> {
        (*self.cell.load()).clone()
    }

    /// Recompute from inputs; returns true when subscribers were notified
    pub fn refresh(&self, networks: &[Arc<NetworkRecord>], selected: Option<&Guid>) -> bool {
        let resolved = resolve(networks, selected).cloned();
        let published = self.cell.replace_unless(Arc::new(resolved), same_record);
        if published {
            debug!(
                network = ?self.get().map(|n| n.name.clone()),
                "Current network changed"
            );
        }
        published
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Arc<Option<Arc<NetworkRecord>>>> {
        self.cell.subscribe()
    }
}

impl Default for CurrentNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn same_record(a: &Option<Arc<NetworkRecord>>, b: &Option<Arc<NetworkRecord>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
