//! The circuit context: one object owning a whole simulated board.
//!
//! [`Circuit`] holds the bus registry, ground reachability, the power
//! manager, the scheduler and the element store. Several circuits coexist
//! freely; nothing is global.
//!
//! # Tick phases
//!
//! [`Circuit::tick`] runs, in order:
//!
//! 1. **Boundary** -- apply queued (de)registrations, refresh ground.
//! 2. **Compute** -- every live element reads committed state.
//! 3. **Commit** -- reset last commit's `changed` flags, then apply the power
//!    queue.
//! 4. **Push** -- every live element enqueues its outputs.
//! 5. **Cleanse** -- every live element clears per-tick flags.
//! 6. **Bookkeeping** -- deliver events, advance the tick counter.
//!
//! A hook that returns an error is reported as [`SimEvent::ElementFault`];
//! the remaining elements still run.
//!
//! Outputs pushed in tick N commit in tick N+1 and are read by downstream
//! elements in tick N+2, so every element stage adds two ticks of latency.

use slotmap::SlotMap;

use crate::bus::{BridgeOutcome, BusRegistry};
use crate::error::{CircuitError, ElementError};
use crate::event::{EventBus, EventKind, PassiveListener, SimEvent};
use crate::element::{ComputeContext, PushContext, SignalView, TickableElement};
use crate::ground::GroundReachability;
use crate::id::{BusId, ElementId, PointId, PowerTarget};
use crate::power::{PowerManager, PowerTransition};
use crate::scheduler::{IterationOrder, Phase, SchedulerRequest, TickReport, TickScheduler};
use crate::sim::Ticks;

/// Result of [`Circuit::settle`].
#[derive(Debug, Clone, Default)]
pub struct Settle {
    pub reports: Vec<TickReport>,
    /// `false` if the tick budget ran out first.
    pub settled: bool,
}

pub struct Circuit {
    buses: BusRegistry,
    ground: GroundReachability,
    power: PowerManager,
    scheduler: TickScheduler,
    elements: SlotMap<ElementId, Box<dyn TickableElement>>,
    event_bus: EventBus,
    /// Events raised between ticks, reported with the next tick.
    deferred: Vec<SimEvent>,
    tick: Ticks,
}

impl std::fmt::Debug for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circuit")
            .field("tick", &self.tick)
            .field("nets", &self.buses.net_count())
            .field("elements", &self.elements.len())
            .field("live", &self.scheduler.live_count())
            .field("pending_power", &self.power.pending_count())
            .finish()
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    pub fn new() -> Self {
        Self {
            buses: BusRegistry::new(),
            ground: GroundReachability::new(),
            power: PowerManager::new(),
            scheduler: TickScheduler::new(),
            elements: SlotMap::with_key(),
            event_bus: EventBus::new(),
            deferred: Vec::new(),
            tick: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn buses(&self) -> &BusRegistry {
        &self.buses
    }

    pub fn ground(&self) -> &GroundReachability {
        &self.ground
    }

    pub fn power_manager(&self) -> &PowerManager {
        &self.power
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Index of the next tick to run.
    pub fn tick_count(&self) -> Ticks {
        self.tick
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Committed-state view, as elements see it.
    pub fn view(&self) -> SignalView<'_> {
        SignalView::new(&self.buses, &self.power, &self.ground, self.tick)
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    pub fn create_bus(&mut self) -> BusId {
        self.buses.create_bus()
    }

    /// Destroy a bus segment, dropping its bridges, bonds, ground
    /// registration and any drive it provided.
    pub fn destroy_bus(&mut self, bus: BusId) -> Result<(), CircuitError> {
        self.buses.destroy_bus(bus)?;
        self.ground.unregister_ground(bus);
        self.power.release(PowerTarget::Bus(bus));
        self.topology_changed();
        Ok(())
    }

    pub fn create_point(&mut self) -> PointId {
        self.buses.create_point()
    }

    pub fn bond(&mut self, point: PointId, bus: BusId) -> Result<(), CircuitError> {
        self.buses.bond(point, bus)?;
        self.topology_changed();
        Ok(())
    }

    pub fn unbond(&mut self, point: PointId) -> Result<(), CircuitError> {
        self.buses.unbond(point)?;
        self.topology_changed();
        Ok(())
    }

    /// Remove a point. Its driver count and any queued power operations for
    /// it are discarded.
    pub fn destroy_point(&mut self, point: PointId) -> Result<(), CircuitError> {
        self.buses.destroy_point(point)?;
        self.power.release(PowerTarget::Point(point));
        self.topology_changed();
        Ok(())
    }

    pub fn add_bridge(&mut self, a: BusId, b: BusId) -> Result<BridgeOutcome, CircuitError> {
        let outcome = self.buses.add_bridge(a, b)?;
        if matches!(outcome, BridgeOutcome::Merged { .. }) {
            self.topology_changed();
        }
        Ok(outcome)
    }

    pub fn remove_bridge(&mut self, a: BusId, b: BusId) -> Result<(), CircuitError> {
        self.buses.remove_bridge(a, b)?;
        self.topology_changed();
        Ok(())
    }

    pub fn connected(&self, a: BusId, b: BusId) -> bool {
        self.buses.connected(a, b)
    }

    pub fn register_ground(&mut self, bus: BusId) -> Result<(), CircuitError> {
        self.ground.register_ground(&self.buses, bus)
    }

    pub fn unregister_ground(&mut self, bus: BusId) {
        self.ground.unregister_ground(bus);
    }

    pub fn is_grounded(&self, bus: BusId) -> Result<bool, CircuitError> {
        self.ground.is_grounded(&self.buses, bus)
    }

    /// Bring net power flags in line with a changed topology. Flips are
    /// reported with the next tick and cleared before its commit, like any
    /// other transition.
    fn topology_changed(&mut self) {
        let transitions = self.power.resync(&mut self.buses);
        let changes = self.scheduler.changes_mut();
        changes.record(&transitions);
        changes.record_flagged(&self.buses);
        let tick = self.tick;
        self.deferred
            .extend(transitions.iter().map(|t| transition_event(t, tick)));
    }

    // -----------------------------------------------------------------------
    // Power
    // -----------------------------------------------------------------------

    pub fn power(&mut self, target: impl Into<PowerTarget>) -> Result<(), CircuitError> {
        self.power.power(&self.buses, target.into())
    }

    pub fn unpower(&mut self, target: impl Into<PowerTarget>) -> Result<(), CircuitError> {
        self.power.unpower(&self.buses, target.into())
    }

    pub fn set_power_state(&mut self, target: impl Into<PowerTarget>, on: bool) -> Result<(), CircuitError> {
        self.power.set_power_state(&self.buses, target.into(), on)
    }

    /// Committed drive state of the target's net.
    pub fn has_power(&self, target: impl Into<PowerTarget>) -> Result<bool, CircuitError> {
        self.power.has_power(&self.buses, target.into())
    }

    /// What an input pin bonded at `point` reads: driven and grounded.
    pub fn reads_power(&self, point: PointId) -> Result<bool, CircuitError> {
        self.view().read(point)
    }

    pub fn is_providing_power(&self, target: impl Into<PowerTarget>) -> Result<bool, CircuitError> {
        self.power.is_providing_power(&self.buses, target.into())
    }

    // -----------------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------------

    /// Store an element and queue its registration.
    pub fn add_element<E: TickableElement + 'static>(&mut self, element: E) -> ElementId {
        self.add_boxed(Box::new(element))
    }

    pub fn add_boxed(&mut self, element: Box<dyn TickableElement>) -> ElementId {
        let id = self.elements.insert(element);
        let queued = self.scheduler.register(id);
        debug_assert!(queued.is_ok(), "fresh element {id:?} already scheduled");
        id
    }

    pub fn register_element(&mut self, id: ElementId) -> Result<(), CircuitError> {
        if !self.elements.contains_key(id) {
            return Err(CircuitError::UnknownElement(id));
        }
        self.scheduler.register(id)
    }

    pub fn deregister_element(&mut self, id: ElementId) -> Result<(), CircuitError> {
        if !self.elements.contains_key(id) {
            return Err(CircuitError::UnknownElement(id));
        }
        self.scheduler.deregister(id);
        Ok(())
    }

    /// Take an element off the board. The caller destroys its pins, which
    /// discards their drive and queued operations.
    pub fn remove_element(&mut self, id: ElementId) -> Result<Box<dyn TickableElement>, CircuitError> {
        let element = self
            .elements
            .remove(id)
            .ok_or(CircuitError::UnknownElement(id))?;
        if self.scheduler.forget(id) {
            self.deferred.push(SimEvent::ElementDeregistered {
                element: id,
                tick: self.tick,
            });
        }
        tracing::debug!(element = ?id, name = element.name(), "element removed");
        Ok(element)
    }

    pub fn contains_element(&self, id: ElementId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Typed access to a stored element.
    pub fn element<T: 'static>(&self, id: ElementId) -> Option<&T> {
        self.elements.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn element_mut<T: 'static>(&mut self, id: ElementId) -> Option<&mut T> {
        self.elements.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn element_dyn(&self, id: ElementId) -> Option<&dyn TickableElement> {
        self.elements.get(id).map(|e| e.as_ref())
    }

    // -----------------------------------------------------------------------
    // Events and ordering
    // -----------------------------------------------------------------------

    /// Subscribe to one event kind. Listeners run at the end of each tick.
    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn set_iteration_order(&mut self, order: IterationOrder) {
        self.scheduler.set_iteration_order(order);
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Advance one tick.
    pub fn tick(&mut self) -> TickReport {
        let tick = self.tick;
        let mut events = std::mem::take(&mut self.deferred);

        self.phase_boundary(tick, &mut events);
        let order = self.scheduler.visit_order();

        let mut requests = Vec::new();
        let mut faults = self.phase_compute(&order, tick, &mut requests, &mut events);
        self.phase_commit(tick, &mut events);
        faults += self.phase_push(&order, tick, &mut events);
        faults += self.phase_cleanse(&order, tick, &mut events);

        // Bookkeeping.
        self.scheduler.enqueue(requests);
        self.scheduler.set_phase(Phase::Idle);
        self.event_bus.deliver(&mut events);
        self.tick += 1;

        TickReport {
            tick,
            events,
            faults,
        }
    }

    pub fn tick_n(&mut self, n: u64) -> Vec<TickReport> {
        (0..n).map(|_| self.tick()).collect()
    }

    /// Tick until nothing is queued and the last commit changed nothing, or
    /// until `max` ticks have run. Always runs at least one tick when `max`
    /// is positive.
    pub fn settle(&mut self, max: u64) -> Settle {
        let mut out = Settle::default();
        for _ in 0..max {
            out.reports.push(self.tick());
            if self.is_quiescent() {
                out.settled = true;
                break;
            }
        }
        out
    }

    /// No queued power, no queued registrations and no change at the last
    /// commit.
    pub fn is_quiescent(&self) -> bool {
        self.power.pending_count() == 0
            && self.scheduler.pending_count() == 0
            && !self.scheduler.changes().is_dirty()
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn phase_boundary(&mut self, tick: Ticks, events: &mut Vec<SimEvent>) {
        let elements = &self.elements;
        for req in self.scheduler.apply_pending(|id| elements.contains_key(id)) {
            events.push(match req {
                SchedulerRequest::Register(element) => SimEvent::ElementRegistered { element, tick },
                SchedulerRequest::Deregister(element) => SimEvent::ElementDeregistered { element, tick },
            });
        }
        self.ground.refresh(&self.buses);
    }

    fn phase_compute(
        &mut self,
        order: &[ElementId],
        tick: Ticks,
        requests: &mut Vec<SchedulerRequest>,
        events: &mut Vec<SimEvent>,
    ) -> usize {
        self.scheduler.set_phase(Phase::Computing);
        let mut faults = 0;
        for &id in order {
            let Some(element) = self.elements.get_mut(id) else {
                continue;
            };
            let mut ctx = ComputeContext {
                view: SignalView::new(&self.buses, &self.power, &self.ground, tick),
                element: id,
                requests: &mut *requests,
                events: &mut *events,
            };
            if let Err(err) = element.compute(&mut ctx) {
                faults += 1;
                report_fault(events, id, element.name(), Phase::Computing, err, tick);
            }
        }
        faults
    }

    fn phase_commit(&mut self, tick: Ticks, events: &mut Vec<SimEvent>) {
        self.scheduler.set_phase(Phase::CommittingPower);
        self.scheduler.changes_mut().reset(&mut self.buses);
        let transitions = self.power.apply_changes(&mut self.buses);
        self.scheduler.changes_mut().record(&transitions);
        events.extend(transitions.iter().map(|t| transition_event(t, tick)));
    }

    fn phase_push(&mut self, order: &[ElementId], tick: Ticks, events: &mut Vec<SimEvent>) -> usize {
        self.scheduler.set_phase(Phase::Pushing);
        let mut faults = 0;
        for &id in order {
            let Some(element) = self.elements.get_mut(id) else {
                continue;
            };
            let mut ctx = PushContext {
                registry: &self.buses,
                power: &mut self.power,
                ground: &self.ground,
                element: id,
                tick,
                events: &mut *events,
            };
            if let Err(err) = element.push(&mut ctx) {
                faults += 1;
                report_fault(events, id, element.name(), Phase::Pushing, err, tick);
            }
        }
        faults
    }

    fn phase_cleanse(&mut self, order: &[ElementId], tick: Ticks, events: &mut Vec<SimEvent>) -> usize {
        self.scheduler.set_phase(Phase::Cleansing);
        let mut faults = 0;
        for &id in order {
            let Some(element) = self.elements.get_mut(id) else {
                continue;
            };
            if let Err(err) = element.cleanse() {
                faults += 1;
                report_fault(events, id, element.name(), Phase::Cleansing, err, tick);
            }
        }
        faults
    }
}

fn transition_event(t: &PowerTransition, tick: Ticks) -> SimEvent {
    if t.powered {
        SimEvent::BusPowered { bus: t.bus, tick }
    } else {
        SimEvent::BusUnpowered { bus: t.bus, tick }
    }
}

fn report_fault(
    events: &mut Vec<SimEvent>,
    element: ElementId,
    name: &str,
    phase: Phase,
    err: ElementError,
    tick: Ticks,
) {
    tracing::warn!(element = ?element, name, phase = ?phase, tick, error = %err, "element hook failed");
    events.push(SimEvent::ElementFault {
        element,
        phase,
        message: err.to_string(),
        tick,
    });
}

// ===========================================================================
// Tests
// ===========================================================================
