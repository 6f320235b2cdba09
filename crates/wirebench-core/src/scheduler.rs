//! Live-set bookkeeping for the tick loop.
//!
//! The scheduler owns *which* elements run and in what order; the
//! [`Circuit`](crate::circuit::Circuit) owns the elements themselves and
//! drives the phases. Registration changes are always queued and land at the
//! next tick boundary, so the live set is frozen while a tick runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dirty::ChangeTracker;
use crate::error::CircuitError;
use crate::event::SimEvent;
use crate::id::ElementId;
use crate::rng::SimRng;
use crate::sim::Ticks;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the tick state machine currently is.
///
/// `Idle -> Computing -> CommittingPower -> Pushing -> Cleansing -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Computing,
    CommittingPower,
    Pushing,
    Cleansing,
}

// ---------------------------------------------------------------------------
// Requests and order
// ---------------------------------------------------------------------------

/// A deferred change to the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerRequest {
    Register(ElementId),
    Deregister(ElementId),
}

impl SchedulerRequest {
    pub fn element(&self) -> ElementId {
        match self {
            SchedulerRequest::Register(id) | SchedulerRequest::Deregister(id) => *id,
        }
    }
}

/// Order in which live elements are visited within each phase. Results never
/// depend on it; the knob exists so tests can prove that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IterationOrder {
    #[default]
    Ascending,
    Descending,
    /// A fresh permutation every tick, drawn from a seeded [`SimRng`].
    Shuffled(u64),
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Index of the tick that ran.
    pub tick: Ticks,
    /// Events raised during the tick, minus suppressed kinds.
    pub events: Vec<SimEvent>,
    /// Number of element hooks that returned an error.
    pub faults: usize,
}

impl TickReport {
    pub fn has_faults(&self) -> bool {
        self.faults > 0
    }
}

// ---------------------------------------------------------------------------
// TickScheduler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TickScheduler {
    live: BTreeSet<ElementId>,
    pending: Vec<SchedulerRequest>,
    phase: Phase,
    order: IterationOrder,
    rng: SimRng,
    changes: ChangeTracker,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            live: BTreeSet::new(),
            pending: Vec::new(),
            phase: Phase::Idle,
            order: IterationOrder::Ascending,
            rng: SimRng::new(0),
            changes: ChangeTracker::new(),
        }
    }

    /// Queue a registration. Registering an element that is live, or will be
    /// once the queue drains, changes nothing and reports
    /// [`CircuitError::DoubleRegistration`].
    pub fn register(&mut self, element: ElementId) -> Result<(), CircuitError> {
        if self.is_scheduled(element) {
            tracing::debug!(element = ?element, "ignoring double registration");
            return Err(CircuitError::DoubleRegistration(element));
        }
        self.pending.push(SchedulerRequest::Register(element));
        Ok(())
    }

    /// Queue a deregistration. The element keeps running until the next tick
    /// boundary.
    pub fn deregister(&mut self, element: ElementId) {
        self.pending.push(SchedulerRequest::Deregister(element));
    }

    /// Membership once every queued request has applied.
    pub fn is_scheduled(&self, element: ElementId) -> bool {
        self.pending
            .iter()
            .fold(self.live.contains(&element), |live, req| match *req {
                SchedulerRequest::Register(id) if id == element => true,
                SchedulerRequest::Deregister(id) if id == element => false,
                _ => live,
            })
    }

    /// Whether the element runs in the current (or next) tick.
    pub fn is_live(&self, element: ElementId) -> bool {
        self.live.contains(&element)
    }

    pub fn live(&self) -> &BTreeSet<ElementId> {
        &self.live
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration_order(&self) -> IterationOrder {
        self.order
    }

    /// Change the visiting order. Selecting `Shuffled` reseeds the generator.
    pub fn set_iteration_order(&mut self, order: IterationOrder) {
        if let IterationOrder::Shuffled(seed) = order {
            self.rng = SimRng::new(seed);
        }
        self.order = order;
    }

    /// Buses flipped by the most recent commit.
    pub fn changes(&self) -> &ChangeTracker {
        &self.changes
    }

    // -- Crate-internal tick plumbing --

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        tracing::trace!(phase = ?phase, "phase");
        self.phase = phase;
    }

    pub(crate) fn changes_mut(&mut self) -> &mut ChangeTracker {
        &mut self.changes
    }

    pub(crate) fn enqueue(&mut self, requests: impl IntoIterator<Item = SchedulerRequest>) {
        self.pending.extend(requests);
    }

    /// Drop every trace of an element: live membership and queued requests.
    /// Returns whether it was live.
    pub(crate) fn forget(&mut self, element: ElementId) -> bool {
        self.pending.retain(|req| req.element() != element);
        self.live.remove(&element)
    }

    /// Apply queued requests in FIFO order. Registrations for elements that
    /// no longer exist are dropped. Returns the requests that actually changed
    /// the live set.
    pub(crate) fn apply_pending(&mut self, exists: impl Fn(ElementId) -> bool) -> Vec<SchedulerRequest> {
        let mut applied = Vec::new();
        for req in std::mem::take(&mut self.pending) {
            let changed = match req {
                SchedulerRequest::Register(id) => {
                    if !exists(id) {
                        tracing::debug!(element = ?id, "dropping registration of removed element");
                        continue;
                    }
                    self.live.insert(id)
                }
                SchedulerRequest::Deregister(id) => self.live.remove(&id),
            };
            if changed {
                applied.push(req);
            }
        }
        if !applied.is_empty() {
            tracing::debug!(applied = applied.len(), live = self.live.len(), "live set updated");
        }
        applied
    }

    /// The live set in this tick's visiting order.
    pub(crate) fn visit_order(&mut self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = self.live.iter().copied().collect();
        match self.order {
            IterationOrder::Ascending => {}
            IterationOrder::Descending => ids.reverse(),
            IterationOrder::Shuffled(_) => self.rng.shuffle(&mut ids),
        }
        ids
    }
}

// ===========================================================================
// Tests
// ===========================================================================
