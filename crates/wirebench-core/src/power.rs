//! Reference-counted power state with a deferred commit.
//!
//! # Design
//!
//! - Every driver (a point, or a bus driving itself) carries a reference
//!   count. A net's drive count is the sum over the drivers that resolve into
//!   it; the net is powered iff that sum is positive (OR semantics).
//! - `power` / `unpower` only enqueue. [`PowerManager::apply_changes`] drains
//!   the queue in FIFO order, so every reader within a compute phase sees the
//!   same committed snapshot.
//! - Net state flips, and a [`PowerTransition`] is reported, only on 0 -> 1
//!   and 1 -> 0 transitions of the drive count.
//! - Topology changes move drivers between nets; [`PowerManager::resync`]
//!   recomputes every drive count from scratch.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::bus::BusRegistry;
use crate::error::CircuitError;
use crate::id::{BusId, PowerTarget};

// ---------------------------------------------------------------------------
// Operations and transitions
// ---------------------------------------------------------------------------

/// A queued power operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerOp {
    Power(PowerTarget),
    UnPower(PowerTarget),
}

impl PowerOp {
    pub fn target(&self) -> PowerTarget {
        match self {
            PowerOp::Power(t) | PowerOp::UnPower(t) => *t,
        }
    }
}

/// A committed change of a net's power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerTransition {
    /// Live handle of the net at the time of the change.
    pub bus: BusId,
    pub powered: bool,
}

// ---------------------------------------------------------------------------
// PowerManager
// ---------------------------------------------------------------------------

/// Per-driver reference counts, the pending operation queue and the derived
/// per-net drive counts.
#[derive(Debug, Default)]
pub struct PowerManager {
    queue: VecDeque<PowerOp>,
    /// Committed count per driver.
    drivers: BTreeMap<PowerTarget, u32>,
    /// Committed count plus queued operations, per driver.
    projected: BTreeMap<PowerTarget, u32>,
    /// Live handle -> sum of driver counts resolving into that net.
    net_counts: BTreeMap<BusId, u32>,
    /// Registry generation the net counts were computed against.
    synced_generation: Option<u64>,
    underflows: u64,
}

impl PowerManager {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Enqueue --

    /// Queue a power-on for the target.
    pub fn power(&mut self, registry: &BusRegistry, target: PowerTarget) -> Result<(), CircuitError> {
        Self::validate(registry, target)?;
        *self.projected.entry(target).or_insert(0) += 1;
        self.queue.push_back(PowerOp::Power(target));
        tracing::trace!(target = ?target, "power queued");
        Ok(())
    }

    /// Queue a power-off for the target.
    pub fn unpower(&mut self, registry: &BusRegistry, target: PowerTarget) -> Result<(), CircuitError> {
        Self::validate(registry, target)?;
        if let Some(count) = self.projected.get_mut(&target) {
            *count = count.saturating_sub(1);
        }
        self.queue.push_back(PowerOp::UnPower(target));
        tracing::trace!(target = ?target, "unpower queued");
        Ok(())
    }

    /// Drive the target to the given level. Level-triggered: repeated calls
    /// with the same level queue nothing, and switching off releases every
    /// outstanding count of this driver.
    pub fn set_power_state(
        &mut self,
        registry: &BusRegistry,
        target: PowerTarget,
        on: bool,
    ) -> Result<(), CircuitError> {
        Self::validate(registry, target)?;
        let projected = self.projected.get(&target).copied().unwrap_or(0);
        if on && projected == 0 {
            self.power(registry, target)?;
        } else if !on {
            for _ in 0..projected {
                self.unpower(registry, target)?;
            }
        }
        Ok(())
    }

    // -- Commit --

    /// Apply every queued operation in FIFO order. Returns the net power
    /// transitions, in the order they happened.
    pub fn apply_changes(&mut self, registry: &mut BusRegistry) -> Vec<PowerTransition> {
        let mut transitions = Vec::new();
        if self.synced_generation != Some(registry.generation()) {
            transitions.extend(self.resync(registry));
        }

        let ops: Vec<PowerOp> = self.queue.drain(..).collect();
        let applied = ops.len();
        for op in ops {
            let target = op.target();
            if !Self::exists(registry, target) {
                tracing::debug!(target = ?target, "discarding power op for removed target");
                continue;
            }
            let net = Self::net_of(registry, target);
            match op {
                PowerOp::Power(_) => {
                    *self.drivers.entry(target).or_insert(0) += 1;
                    if let Some(net) = net {
                        let count = self.net_counts.entry(net).or_insert(0);
                        *count += 1;
                        if *count == 1 {
                            registry.set_powered(net, true);
                            transitions.push(PowerTransition { bus: net, powered: true });
                        }
                    }
                }
                PowerOp::UnPower(_) => {
                    let Some(driver) = self.drivers.get_mut(&target).filter(|c| **c > 0) else {
                        self.underflows += 1;
                        tracing::warn!(target = ?target, "power reference count underflow, clamped to zero");
                        debug_assert!(false, "power reference count underflow on {target:?}");
                        continue;
                    };
                    *driver -= 1;
                    if *driver == 0 {
                        self.drivers.remove(&target);
                    }
                    if let Some(net) = net {
                        if let Some(count) = self.net_counts.get_mut(&net) {
                            *count = count.saturating_sub(1);
                            if *count == 0 {
                                self.net_counts.remove(&net);
                                registry.set_powered(net, false);
                                transitions.push(PowerTransition { bus: net, powered: false });
                            }
                        }
                    }
                }
            }
        }

        // The queue is empty, so the projection is exactly the committed state.
        self.projected = self.drivers.clone();
        if applied > 0 {
            tracing::debug!(ops = applied, transitions = transitions.len(), "power changes applied");
        }
        transitions
    }

    /// Recompute every net's drive count from the driver table and bring the
    /// registry's power flags in line. Call after any topology change.
    pub fn resync(&mut self, registry: &mut BusRegistry) -> Vec<PowerTransition> {
        let mut counts: BTreeMap<BusId, u32> = BTreeMap::new();
        for (&target, &count) in &self.drivers {
            if let Some(net) = Self::net_of(registry, target) {
                *counts.entry(net).or_insert(0) += count;
            }
        }

        let flips: Vec<(BusId, bool)> = registry
            .nets()
            .filter_map(|net| {
                let want = counts.get(&net.id()).is_some_and(|c| *c > 0);
                (net.is_powered() != want).then_some((net.id(), want))
            })
            .collect();
        let mut transitions = Vec::with_capacity(flips.len());
        for (bus, powered) in flips {
            registry.set_powered(bus, powered);
            transitions.push(PowerTransition { bus, powered });
        }

        self.net_counts = counts;
        self.synced_generation = Some(registry.generation());
        transitions
    }

    /// Forget a driver entirely: its committed count and any queued
    /// operations targeting it. Used when a point is removed from the board.
    pub fn release(&mut self, target: PowerTarget) {
        self.drivers.remove(&target);
        self.projected.remove(&target);
        self.queue.retain(|op| op.target() != target);
        // Net counts are stale until the next resync.
        self.synced_generation = None;
    }

    // -- Queries --

    /// Committed power state of the net the target belongs to. Queued
    /// operations are not visible until the next commit.
    pub fn has_power(&self, registry: &BusRegistry, target: PowerTarget) -> Result<bool, CircuitError> {
        let net = Self::resolve_target(registry, target)?;
        Ok(registry.bus(net)?.is_powered())
    }

    /// Whether this specific driver has a positive committed count.
    pub fn is_providing_power(
        &self,
        registry: &BusRegistry,
        target: PowerTarget,
    ) -> Result<bool, CircuitError> {
        if !Self::exists(registry, target) {
            return Err(match target {
                PowerTarget::Point(p) => CircuitError::UnknownPoint(p),
                PowerTarget::Bus(b) => CircuitError::UnknownBus(b),
            });
        }
        Ok(self.drivers.get(&target).is_some_and(|c| *c > 0))
    }

    /// Committed count of a single driver.
    pub fn driver_count(&self, target: PowerTarget) -> u32 {
        self.drivers.get(&target).copied().unwrap_or(0)
    }

    /// Committed drive count of the net a handle belongs to.
    pub fn net_count(&self, registry: &BusRegistry, bus: BusId) -> Result<u32, CircuitError> {
        let net = registry.resolve(bus)?;
        Ok(self.net_counts.get(&net).copied().unwrap_or(0))
    }

    /// Number of queued operations.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of underflowing unpowers clamped so far.
    pub fn underflow_count(&self) -> u64 {
        self.underflows
    }

    // -- Internal --

    fn validate(registry: &BusRegistry, target: PowerTarget) -> Result<(), CircuitError> {
        Self::resolve_target(registry, target).map(|_| ())
    }

    fn resolve_target(registry: &BusRegistry, target: PowerTarget) -> Result<BusId, CircuitError> {
        match target {
            PowerTarget::Point(p) => registry.bus_of(p),
            PowerTarget::Bus(b) => registry.resolve(b),
        }
    }

    fn exists(registry: &BusRegistry, target: PowerTarget) -> bool {
        match target {
            PowerTarget::Point(p) => registry.contains_point(p),
            PowerTarget::Bus(b) => registry.contains_bus(b),
        }
    }

    /// The net a driver currently feeds, if it is connected.
    fn net_of(registry: &BusRegistry, target: PowerTarget) -> Option<BusId> {
        Self::resolve_target(registry, target).ok()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
