//! The lifecycle contract every simulated component implements.
//!
//! Each tick the scheduler calls, for every live element:
//!
//! 1. [`TickableElement::compute`] with a [`ComputeContext`]: read committed
//!    bus state and work out the next internal state. The context has no
//!    route to the power queue, so compute cannot disturb what other
//!    elements read in the same phase.
//! 2. [`TickableElement::push`] with a [`PushContext`]: enqueue output power
//!    changes. They commit during the next tick.
//! 3. [`TickableElement::cleanse`]: clear per-tick flags.
//!
//! All three default to no-ops, so elements only override what they use.

use crate::bus::BusRegistry;
use crate::error::{CircuitError, ElementError};
use crate::event::SimEvent;
use crate::ground::GroundReachability;
use crate::id::{ElementId, PointId, PowerTarget};
use crate::power::PowerManager;
use crate::scheduler::SchedulerRequest;
use crate::sim::Ticks;

// ---------------------------------------------------------------------------
// TickableElement trait
// ---------------------------------------------------------------------------

/// A simulated component driven by the tick scheduler.
pub trait TickableElement: std::fmt::Debug {
    /// Human-readable name, used in logs and fault reports.
    fn name(&self) -> &str;

    /// Read inputs as committed at the end of the previous tick and compute
    /// the next state.
    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        let _ = ctx;
        Ok(())
    }

    /// Enqueue the outputs computed during `compute`.
    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        let _ = ctx;
        Ok(())
    }

    /// Clear transient per-tick state.
    fn cleanse(&mut self) -> Result<(), ElementError> {
        Ok(())
    }

    /// Downcast to `&dyn Any` for typed access to concrete elements.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to `&mut dyn Any` for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ---------------------------------------------------------------------------
// SignalView
// ---------------------------------------------------------------------------

/// Read-only view of committed bus state.
#[derive(Clone, Copy)]
pub struct SignalView<'a> {
    pub(crate) registry: &'a BusRegistry,
    pub(crate) power: &'a PowerManager,
    pub(crate) ground: &'a GroundReachability,
    pub(crate) tick: Ticks,
}

impl<'a> SignalView<'a> {
    pub fn new(
        registry: &'a BusRegistry,
        power: &'a PowerManager,
        ground: &'a GroundReachability,
        tick: Ticks,
    ) -> Self {
        Self {
            registry,
            power,
            ground,
            tick,
        }
    }

    /// Whether the point's net is driven, regardless of ground.
    pub fn has_power(&self, point: PointId) -> Result<bool, CircuitError> {
        self.power.has_power(self.registry, PowerTarget::Point(point))
    }

    /// Whether the point's net reaches a ground reference.
    pub fn is_grounded(&self, point: PointId) -> Result<bool, CircuitError> {
        let segment = self.registry.segment_of(point)?;
        self.ground.is_grounded(self.registry, segment)
    }

    /// The value an input pin reads: driven and grounded.
    pub fn read(&self, point: PointId) -> Result<bool, CircuitError> {
        Ok(self.has_power(point)? && self.is_grounded(point)?)
    }

    /// Whether the point's net flipped at the last commit.
    pub fn changed(&self, point: PointId) -> Result<bool, CircuitError> {
        let bus = self.registry.bus_of(point)?;
        Ok(self.registry.bus(bus)?.changed())
    }

    /// Whether this point is itself an active driver.
    pub fn is_providing_power(&self, point: PointId) -> Result<bool, CircuitError> {
        self.power.is_providing_power(self.registry, PowerTarget::Point(point))
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }
}

// ---------------------------------------------------------------------------
// ComputeContext
// ---------------------------------------------------------------------------

/// Context passed to `compute`: committed state plus deferred scheduler
/// requests and event emission.
pub struct ComputeContext<'a> {
    pub(crate) view: SignalView<'a>,
    pub(crate) element: ElementId,
    pub(crate) requests: &'a mut Vec<SchedulerRequest>,
    pub(crate) events: &'a mut Vec<SimEvent>,
}

impl<'a> ComputeContext<'a> {
    /// The element being computed.
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn tick(&self) -> Ticks {
        self.view.tick
    }

    /// The committed-state view.
    pub fn view(&self) -> SignalView<'a> {
        self.view
    }

    pub fn read(&self, point: PointId) -> Result<bool, CircuitError> {
        self.view.read(point)
    }

    pub fn has_power(&self, point: PointId) -> Result<bool, CircuitError> {
        self.view.has_power(point)
    }

    pub fn is_grounded(&self, point: PointId) -> Result<bool, CircuitError> {
        self.view.is_grounded(point)
    }

    pub fn changed(&self, point: PointId) -> Result<bool, CircuitError> {
        self.view.changed(point)
    }

    /// Leave the live set at the next tick boundary. This tick's push and
    /// cleanse still run.
    pub fn deregister_self(&mut self) {
        self.requests.push(SchedulerRequest::Deregister(self.element));
    }

    /// Queue another element for registration at the next tick boundary.
    pub fn register(&mut self, element: ElementId) {
        self.requests.push(SchedulerRequest::Register(element));
    }

    /// Queue another element for deregistration at the next tick boundary.
    pub fn deregister(&mut self, element: ElementId) {
        self.requests.push(SchedulerRequest::Deregister(element));
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

// ---------------------------------------------------------------------------
// PushContext
// ---------------------------------------------------------------------------

/// Context passed to `push`: the power queue plus committed state.
pub struct PushContext<'a> {
    pub(crate) registry: &'a BusRegistry,
    pub(crate) power: &'a mut PowerManager,
    pub(crate) ground: &'a GroundReachability,
    pub(crate) element: ElementId,
    pub(crate) tick: Ticks,
    pub(crate) events: &'a mut Vec<SimEvent>,
}

impl PushContext<'_> {
    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    /// The committed-state view. Operations queued during this push are not
    /// visible through it.
    pub fn view(&self) -> SignalView<'_> {
        SignalView::new(self.registry, &*self.power, self.ground, self.tick)
    }

    /// Drive an output pin to a level; see [`PowerManager::set_power_state`].
    pub fn set_power_state(&mut self, point: PointId, on: bool) -> Result<(), CircuitError> {
        self.power
            .set_power_state(self.registry, PowerTarget::Point(point), on)
    }

    pub fn power(&mut self, target: PowerTarget) -> Result<(), CircuitError> {
        self.power.power(self.registry, target)
    }

    pub fn unpower(&mut self, target: PowerTarget) -> Result<(), CircuitError> {
        self.power.unpower(self.registry, target)
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

// ---------------------------------------------------------------------------
// IndexedPins
// ---------------------------------------------------------------------------

/// A fixed-size ordered pin array for multi-bit elements. Ranges are
/// half-open: `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPins {
    pins: Vec<PointId>,
}

impl IndexedPins {
    pub fn new(pins: Vec<PointId>) -> Self {
        Self { pins }
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn pins(&self) -> &[PointId] {
        &self.pins
    }

    pub fn pin(&self, index: usize) -> Result<PointId, CircuitError> {
        self.pins
            .get(index)
            .copied()
            .ok_or(CircuitError::IndexOutOfRange {
                start: index,
                end: index + 1,
                len: self.pins.len(),
            })
    }

    fn check_range(&self, start: usize, end: usize) -> Result<&[PointId], CircuitError> {
        if start > end || end > self.pins.len() {
            return Err(CircuitError::IndexOutOfRange {
                start,
                end,
                len: self.pins.len(),
            });
        }
        Ok(&self.pins[start..end])
    }

    /// Read pins `start..end`.
    pub fn values(&self, view: &SignalView<'_>, start: usize, end: usize) -> Result<Vec<bool>, CircuitError> {
        self.check_range(start, end)?
            .iter()
            .map(|p| view.read(*p))
            .collect()
    }

    /// Drive pins `start..end` to `values`. The slice length must match the
    /// range. Every pin is resolved before anything is queued, so a
    /// disconnected or removed pin leaves the whole range untouched.
    pub fn set_values(
        &self,
        ctx: &mut PushContext<'_>,
        start: usize,
        end: usize,
        values: &[bool],
    ) -> Result<(), CircuitError> {
        let pins = self.check_range(start, end)?;
        if values.len() != pins.len() {
            return Err(CircuitError::IndexOutOfRange {
                start,
                end: start + values.len(),
                len: self.pins.len(),
            });
        }
        for pin in pins {
            ctx.registry.bus_of(*pin)?;
        }
        for (pin, on) in pins.iter().zip(values) {
            ctx.set_power_state(*pin, *on)?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
