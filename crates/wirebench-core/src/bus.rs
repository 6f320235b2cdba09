//! Signal buses and the bridge topology that joins them.
//!
//! Every [`BusRegistry::create_bus`] call yields a *segment*. Bridges join
//! segments into nets; a net is addressed by its *live handle*, the smallest
//! segment id it contains. Any segment handle resolves transparently to the
//! live handle of its net, so callers holding an absorbed handle are
//! redirected rather than reading stale state. Destroyed handles fail with
//! [`CircuitError::UnknownBus`].
//!
//! Bridges are reference-counted per segment pair. Removing the last bridge
//! between two segments rebuilds all groupings from scratch, so nets split
//! again when a cable is unplugged.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use slotmap::{SecondaryMap, SlotMap};

use crate::error::CircuitError;
use crate::id::{BusId, PointId};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A bus segment: the points bonded directly to one `create_bus` handle.
#[derive(Debug, Clone, Default)]
struct Segment {
    members: BTreeSet<PointId>,
}

/// A connection point. Unbonded points are disconnected.
#[derive(Debug, Clone, Default)]
struct Point {
    bus: Option<BusId>,
}

/// One electrically joined signal net.
///
/// All member points observe the same `powered` state. `changed` is set by
/// the power commit that flipped `powered` and cleared once per tick, right
/// before the next commit.
#[derive(Debug, Clone)]
pub struct Bus {
    id: BusId,
    segments: BTreeSet<BusId>,
    powered: bool,
    changed: bool,
}

impl Bus {
    fn new(id: BusId) -> Self {
        let mut segments = BTreeSet::new();
        segments.insert(id);
        Self {
            id,
            segments,
            powered: false,
            changed: false,
        }
    }

    /// The live handle of this net.
    pub fn id(&self) -> BusId {
        self.id
    }

    /// Segments joined into this net.
    pub fn segments(&self) -> &BTreeSet<BusId> {
        &self.segments
    }

    /// Committed power state.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Whether the last commit flipped this bus.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

/// What an `add_bridge` call did to the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Both ends were the same segment.
    SelfBridge,
    /// The segments were already in one net; only the bridge count moved.
    Counted,
    /// Two nets merged; `absorbed` now redirects to `survivor`.
    Merged { survivor: BusId, absorbed: BusId },
}

// ---------------------------------------------------------------------------
// BusRegistry
// ---------------------------------------------------------------------------

/// Owns bus segments, connection points, bridges and the derived nets.
#[derive(Debug, Default)]
pub struct BusRegistry {
    segments: SlotMap<BusId, Segment>,
    points: SlotMap<PointId, Point>,
    /// Normalized `(min, max)` segment pair -> number of bridges.
    bridges: BTreeMap<(BusId, BusId), u32>,
    /// Segment -> live handle of its net. Absorbed handles redirect here.
    roots: SecondaryMap<BusId, BusId>,
    /// Live handle -> net.
    nets: BTreeMap<BusId, Bus>,
    /// Bumped on every structural change.
    generation: u64,
}

fn pair(a: BusId, b: BusId) -> (BusId, BusId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Segments --

    /// Allocate a new empty, unpowered bus.
    pub fn create_bus(&mut self) -> BusId {
        let id = self.segments.insert(Segment::default());
        self.roots.insert(id, id);
        self.nets.insert(id, Bus::new(id));
        self.generation += 1;
        tracing::trace!(bus = ?id, "bus created");
        id
    }

    /// Destroy a segment: its bridges are dropped, its points unbonded and
    /// the remaining topology regrouped.
    pub fn destroy_bus(&mut self, bus: BusId) -> Result<(), CircuitError> {
        let segment = self.segments.remove(bus).ok_or(CircuitError::UnknownBus(bus))?;
        for point in segment.members {
            if let Some(p) = self.points.get_mut(point) {
                p.bus = None;
            }
        }
        self.bridges.retain(|&(a, b), _| a != bus && b != bus);
        self.roots.remove(bus);
        self.rebuild();
        tracing::debug!(bus = ?bus, "bus destroyed");
        Ok(())
    }

    /// Resolve any segment handle to the live handle of its net.
    pub fn resolve(&self, bus: BusId) -> Result<BusId, CircuitError> {
        self.roots.get(bus).copied().ok_or(CircuitError::UnknownBus(bus))
    }

    /// Whether the handle names a segment that still exists.
    pub fn contains_bus(&self, bus: BusId) -> bool {
        self.segments.contains_key(bus)
    }

    /// The net a handle belongs to.
    pub fn bus(&self, bus: BusId) -> Result<&Bus, CircuitError> {
        let root = self.resolve(bus)?;
        self.nets.get(&root).ok_or(CircuitError::UnknownBus(bus))
    }

    /// All live nets, keyed by live handle.
    pub fn nets(&self) -> impl Iterator<Item = &Bus> {
        self.nets.values()
    }

    /// Number of live nets.
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Topology generation. Changes whenever nets may have changed shape.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // -- Points --

    /// Allocate a disconnected connection point.
    pub fn create_point(&mut self) -> PointId {
        self.points.insert(Point::default())
    }

    /// Bond a point to a segment, moving it off any previous segment.
    pub fn bond(&mut self, point: PointId, bus: BusId) -> Result<(), CircuitError> {
        if !self.segments.contains_key(bus) {
            return Err(CircuitError::UnknownBus(bus));
        }
        let p = self
            .points
            .get_mut(point)
            .ok_or(CircuitError::UnknownPoint(point))?;
        if let Some(old) = p.bus.replace(bus) {
            if let Some(seg) = self.segments.get_mut(old) {
                seg.members.remove(&point);
            }
        }
        if let Some(seg) = self.segments.get_mut(bus) {
            seg.members.insert(point);
        }
        self.generation += 1;
        Ok(())
    }

    /// Detach a point from its segment. No-op for an already disconnected
    /// point.
    pub fn unbond(&mut self, point: PointId) -> Result<(), CircuitError> {
        let p = self
            .points
            .get_mut(point)
            .ok_or(CircuitError::UnknownPoint(point))?;
        if let Some(old) = p.bus.take() {
            if let Some(seg) = self.segments.get_mut(old) {
                seg.members.remove(&point);
            }
            self.generation += 1;
        }
        Ok(())
    }

    /// Remove a point entirely.
    pub fn destroy_point(&mut self, point: PointId) -> Result<(), CircuitError> {
        self.unbond(point)?;
        self.points.remove(point);
        Ok(())
    }

    /// Whether the handle names a point that still exists.
    pub fn contains_point(&self, point: PointId) -> bool {
        self.points.contains_key(point)
    }

    /// The segment a point is bonded to (not resolved to its net).
    pub fn segment_of(&self, point: PointId) -> Result<BusId, CircuitError> {
        let p = self
            .points
            .get(point)
            .ok_or(CircuitError::UnknownPoint(point))?;
        p.bus.ok_or(CircuitError::Disconnected(point))
    }

    /// The live handle of the net a point is bonded to.
    pub fn bus_of(&self, point: PointId) -> Result<BusId, CircuitError> {
        let segment = self.segment_of(point)?;
        self.resolve(segment)
    }

    /// All points bonded anywhere in the net.
    pub fn members(&self, bus: BusId) -> Result<Vec<PointId>, CircuitError> {
        let net = self.bus(bus)?;
        Ok(net
            .segments
            .iter()
            .filter_map(|s| self.segments.get(*s))
            .flat_map(|s| s.members.iter().copied())
            .collect())
    }

    // -- Bridges --

    /// Bridge two buses. Segments already in the same net only gain a
    /// bridge count; otherwise the larger live handle is absorbed into the
    /// smaller one.
    pub fn add_bridge(&mut self, a: BusId, b: BusId) -> Result<BridgeOutcome, CircuitError> {
        let ra = self.resolve(a)?;
        let rb = self.resolve(b)?;
        if a == b {
            return Ok(BridgeOutcome::SelfBridge);
        }
        *self.bridges.entry(pair(a, b)).or_insert(0) += 1;
        if ra == rb {
            return Ok(BridgeOutcome::Counted);
        }

        let (survivor, absorbed) = if ra < rb { (ra, rb) } else { (rb, ra) };
        let Some(gone) = self.nets.remove(&absorbed) else {
            return Err(CircuitError::UnknownBus(absorbed));
        };
        for seg in &gone.segments {
            if let Some(root) = self.roots.get_mut(*seg) {
                *root = survivor;
            }
        }
        if let Some(net) = self.nets.get_mut(&survivor) {
            net.segments.extend(gone.segments.iter().copied());
            net.changed |= gone.changed;
        }
        self.generation += 1;
        tracing::debug!(survivor = ?survivor, absorbed = ?absorbed, "buses merged");
        Ok(BridgeOutcome::Merged { survivor, absorbed })
    }

    /// Remove one bridge between two segments. The last bridge between a
    /// pair triggers a full regrouping.
    pub fn remove_bridge(&mut self, a: BusId, b: BusId) -> Result<(), CircuitError> {
        self.resolve(a)?;
        self.resolve(b)?;
        if a == b {
            return Ok(());
        }
        let key = pair(a, b);
        let Some(count) = self.bridges.get_mut(&key) else {
            return Err(CircuitError::BridgeNotFound { a, b });
        };
        *count -= 1;
        if *count == 0 {
            self.bridges.remove(&key);
            self.rebuild();
        }
        Ok(())
    }

    /// Number of bridges recorded between two segments.
    pub fn bridge_count(&self, a: BusId, b: BusId) -> u32 {
        self.bridges.get(&pair(a, b)).copied().unwrap_or(0)
    }

    /// Whether two handles resolve to the same net.
    pub fn connected(&self, a: BusId, b: BusId) -> bool {
        match (self.resolve(a), self.resolve(b)) {
            (Ok(ra), Ok(rb)) => ra == rb,
            _ => false,
        }
    }

    /// Segment adjacency derived from the bridge set.
    pub fn bridge_graph(&self) -> BTreeMap<BusId, Vec<BusId>> {
        let mut graph: BTreeMap<BusId, Vec<BusId>> = BTreeMap::new();
        for &(a, b) in self.bridges.keys() {
            graph.entry(a).or_default().push(b);
            graph.entry(b).or_default().push(a);
        }
        graph
    }

    // -- State written by the power manager --

    pub(crate) fn set_powered(&mut self, bus: BusId, powered: bool) {
        if let Some(net) = self.nets.get_mut(&bus) {
            if net.powered != powered {
                net.powered = powered;
                net.changed = true;
            }
        }
    }

    /// Clear the `changed` flag. Unknown or destroyed handles are ignored.
    pub(crate) fn clear_changed(&mut self, bus: BusId) {
        if let Ok(root) = self.resolve(bus) {
            if let Some(net) = self.nets.get_mut(&root) {
                net.changed = false;
            }
        }
    }

    // -- Internal --

    /// Recompute every net from the bridge graph. Each new net inherits the
    /// flags of the net its smallest segment belonged to.
    fn rebuild(&mut self) {
        let graph = self.bridge_graph();
        let previous = std::mem::take(&mut self.nets);
        let mut inherited: BTreeMap<BusId, (bool, bool)> = BTreeMap::new();
        for (seg, root) in self.roots.iter() {
            if let Some(net) = previous.get(root) {
                inherited.insert(seg, (net.powered, net.changed));
            }
        }

        let mut ordered: Vec<BusId> = self.segments.keys().collect();
        ordered.sort();
        let mut seen: BTreeSet<BusId> = BTreeSet::new();
        for start in ordered {
            if !seen.insert(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(seg) = queue.pop_front() {
                component.insert(seg);
                for &next in graph.get(&seg).map(Vec::as_slice).unwrap_or(&[]) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            // `start` is the smallest unseen id, hence the smallest in its
            // component.
            let mut net = Bus::new(start);
            if let Some(&(powered, changed)) = inherited.get(&start) {
                net.powered = powered;
                net.changed = changed;
            }
            for &seg in &component {
                self.roots.insert(seg, start);
            }
            net.segments = component;
            self.nets.insert(start, net);
        }
        self.generation += 1;
        tracing::debug!(nets = self.nets.len(), "bus groupings rebuilt");
    }
}

// ===========================================================================
// Tests
// ===========================================================================
