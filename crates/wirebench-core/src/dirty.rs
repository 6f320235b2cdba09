use std::collections::BTreeSet;

use crate::bus::{Bus, BusRegistry};
use crate::id::BusId;
use crate::power::PowerTransition;

/// Tracks which buses flipped at the most recent power commit.
///
/// The scheduler resets these buses right before the *next* commit rather
/// than straight after push, so last tick's `changed` flags stay observable
/// through the following compute phase.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    changed: BTreeSet<BusId>,
}

impl ChangeTracker {
    /// Create a new tracker with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the buses touched by a commit.
    pub fn record(&mut self, transitions: &[PowerTransition]) {
        self.changed.extend(transitions.iter().map(|t| t.bus));
    }

    /// Record every net whose `changed` flag is currently set. A regrouping
    /// hands the flag to split-off nets without any transition, so they
    /// must be picked up here or they would never be cleared.
    pub fn record_flagged(&mut self, registry: &BusRegistry) {
        self.changed
            .extend(registry.nets().filter(|n| n.changed()).map(Bus::id));
    }

    /// Clear the `changed` flag on every recorded bus and forget them.
    /// Handles that were destroyed since are skipped.
    pub fn reset(&mut self, registry: &mut BusRegistry) {
        for bus in std::mem::take(&mut self.changed) {
            registry.clear_changed(bus);
        }
    }

    /// Returns `true` if anything is recorded.
    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Recorded bus handles.
    pub fn changed(&self) -> &BTreeSet<BusId> {
        &self.changed
    }
}
