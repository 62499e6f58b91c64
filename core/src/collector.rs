//! Buffered URL add/remove tracking
//!
//! Inventory notifications arrive on arbitrary tasks and threads while the
//! ping manager reads the working set once per cycle. The
//! [`UrlChangesCollector`] sits between the two: writers record creates and
//! deletes into a pending buffer, and the manager drains the buffer into its
//! working set with [`UrlChangesCollector::apply`].
//!
//! Only the net outcome per destination is defined. A destination that was
//! both created and deleted within one apply window ends up absent.

use schema::{InventoryAction, InventoryEvent, PingDestination};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct PendingChanges {
    added: HashSet<PingDestination>,
    removed: HashSet<PingDestination>,
}

/// Changes actually made to a working set by one [`UrlChangesCollector::apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Destinations that were not in the working set and now are
    pub added: Vec<PingDestination>,
    /// Destinations that were in the working set and no longer are
    pub removed: Vec<PingDestination>,
}

impl AppliedChanges {
    /// Whether the apply changed nothing
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Number of buffered changes waiting for the next apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Buffered creates
    pub added: usize,
    /// Buffered deletes
    pub removed: usize,
}

/// Thread-safe buffer of destination creates and deletes
#[derive(Debug, Default)]
pub struct UrlChangesCollector {
    pending: Mutex<PendingChanges>,
}

impl UrlChangesCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingChanges> {
        // The buffer holds plain sets, so a panic mid-insert cannot corrupt it
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that a destination was created
    pub fn record_created(&self, destination: PingDestination) {
        debug!("Recording created destination {}", destination);
        self.lock().added.insert(destination);
    }

    /// Record that a destination was deleted
    pub fn record_deleted(&self, destination: PingDestination) {
        debug!("Recording deleted destination {}", destination);
        self.lock().removed.insert(destination);
    }

    /// Record an inventory event
    ///
    /// Returns `false` when the event does not describe a usable URL resource
    /// and was ignored.
    pub fn record(&self, event: &InventoryEvent) -> bool {
        let Some(destination) = event.destination() else {
            debug!(
                "Ignoring inventory event for resource '{}' of type '{}'",
                event.resource.id, event.resource.resource_type
            );
            return false;
        };
        match event.action {
            InventoryAction::Created => self.record_created(destination),
            InventoryAction::Deleted => self.record_deleted(destination),
        }
        true
    }

    /// Counts of buffered changes
    pub fn pending(&self) -> PendingCounts {
        let pending = self.lock();
        PendingCounts {
            added: pending.added.len(),
            removed: pending.removed.len(),
        }
    }

    /// Drain the buffered changes into `working_set`
    ///
    /// The buffer is swapped out under the lock, so changes recorded while
    /// this runs are kept for the next apply.
    pub fn apply(&self, working_set: &mut HashSet<PingDestination>) -> AppliedChanges {
        let PendingChanges { added, removed } = std::mem::take(&mut *self.lock());

        let mut applied = AppliedChanges::default();
        for destination in added {
            if removed.contains(&destination) {
                continue;
            }
            if working_set.insert(destination.clone()) {
                applied.added.push(destination);
            }
        }
        for destination in removed {
            if working_set.remove(&destination) {
                applied.removed.push(destination);
            }
        }
        applied
    }
}
