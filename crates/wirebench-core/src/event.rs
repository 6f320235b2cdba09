//! Simulation events and passive listeners.
//!
//! Events are collected while a tick runs and delivered in one batch at the
//! end of the tick, after cleanse. Every tick's events are also returned in
//! its [`TickReport`](crate::scheduler::TickReport), so callers can either
//! subscribe or poll.

use crate::id::{BusId, ElementId};
use crate::scheduler::Phase;
use crate::sim::Ticks;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    // -- Power --
    BusPowered {
        bus: BusId,
        tick: Ticks,
    },
    BusUnpowered {
        bus: BusId,
        tick: Ticks,
    },

    // -- Scheduler --
    ElementRegistered {
        element: ElementId,
        tick: Ticks,
    },
    ElementDeregistered {
        element: ElementId,
        tick: Ticks,
    },
    /// An element hook returned an error. The tick carried on without it.
    ElementFault {
        element: ElementId,
        phase: Phase,
        message: String,
        tick: Ticks,
    },

    // -- Elements --
    /// A processor's program failed. Raised by the element itself.
    RuntimeError {
        element: ElementId,
        message: String,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    BusPowered,
    BusUnpowered,
    ElementRegistered,
    ElementDeregistered,
    ElementFault,
    RuntimeError,
}

const EVENT_KIND_COUNT: usize = 6;

impl SimEvent {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::BusPowered { .. } => EventKind::BusPowered,
            SimEvent::BusUnpowered { .. } => EventKind::BusUnpowered,
            SimEvent::ElementRegistered { .. } => EventKind::ElementRegistered,
            SimEvent::ElementDeregistered { .. } => EventKind::ElementDeregistered,
            SimEvent::ElementFault { .. } => EventKind::ElementFault,
            SimEvent::RuntimeError { .. } => EventKind::RuntimeError,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            SimEvent::BusPowered { tick, .. }
            | SimEvent::BusUnpowered { tick, .. }
            | SimEvent::ElementRegistered { tick, .. }
            | SimEvent::ElementDeregistered { tick, .. }
            | SimEvent::ElementFault { tick, .. }
            | SimEvent::RuntimeError { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&SimEvent)>;

/// Listener lists per event kind, plus suppression flags.
pub struct EventBus {
    listeners: [Vec<PassiveListener>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<usize> = self.listeners.iter().map(Vec::len).collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .field("suppressed", &self.suppressed)
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
        }
    }

    /// Register a passive listener for one event kind. Listeners run in
    /// registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners[kind.index()].push(listener);
    }

    /// Suppress an event kind. Suppressed events are dropped before
    /// delivery and never reach a [`TickReport`](crate::scheduler::TickReport).
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    /// Check if an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Drop suppressed events from a batch, then hand the remainder to
    /// listeners oldest-to-newest.
    pub fn deliver(&mut self, events: &mut Vec<SimEvent>) {
        events.retain(|e| !self.suppressed[e.kind().index()]);
        for event in events.iter() {
            for listener in &mut self.listeners[event.kind().index()] {
                listener(event);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
