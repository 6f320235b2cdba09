//! Placement records: a persisted build history replayed onto a fresh
//! circuit.
//!
//! Ops name earlier objects by *ordinal*, the index of their creation among
//! objects of the same kind, never by runtime key. Replay goes through the
//! same [`Circuit`] calls used at interactive build time, so a replayed board
//! is indistinguishable from one built by hand. Destroyed objects keep their
//! ordinal; ops naming them fail the way the live call would.

use serde::{Deserialize, Serialize};
use wirebench_core::circuit::Circuit;
use wirebench_core::error::CircuitError;
use wirebench_core::id::{BusId, ElementId, PointId, PowerTarget};
use wirebench_logic::{ElementSpec, LogicError};

/// Creation index of a bus, point or element within a record.
pub type Ordinal = usize;

// ---------------------------------------------------------------------------
// Ops
// ---------------------------------------------------------------------------

/// Drive target by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    Point(Ordinal),
    Bus(Ordinal),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementOp {
    // -- Buses and points --
    CreateBus,
    DestroyBus { bus: Ordinal },
    CreatePoint,
    Bond { point: Ordinal, bus: Ordinal },
    Unbond { point: Ordinal },
    DestroyPoint { point: Ordinal },

    // -- Topology --
    AddBridge { a: Ordinal, b: Ordinal },
    RemoveBridge { a: Ordinal, b: Ordinal },
    RegisterGround { bus: Ordinal },
    UnregisterGround { bus: Ordinal },

    // -- Elements --
    PlaceElement { spec: ElementSpec<Ordinal> },
    RemoveElement { element: Ordinal },

    // -- Drive --
    Power { target: TargetRef },
    UnPower { target: TargetRef },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// An op names an ordinal no earlier op created.
    #[error("op {op}: no {kind} with ordinal {ordinal}")]
    UnknownOrdinal {
        op: usize,
        kind: &'static str,
        ordinal: Ordinal,
    },

    #[error("op {op}: {source}")]
    Circuit {
        op: usize,
        #[source]
        source: CircuitError,
    },

    #[error("op {op}: {source}")]
    Logic {
        op: usize,
        #[source]
        source: LogicError,
    },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// PlacementRecord
// ---------------------------------------------------------------------------

/// An ordered build history.
///
/// The `create_*` and `place` helpers append an op and hand back the ordinal
/// the created object will have on replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub ops: Vec<PlacementOp>,
    #[serde(skip)]
    counts: Counts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counts {
    buses: usize,
    points: usize,
    elements: usize,
}

impl Counts {
    fn of(ops: &[PlacementOp]) -> Self {
        let mut counts = Counts::default();
        for op in ops {
            counts.note(op);
        }
        counts
    }

    fn note(&mut self, op: &PlacementOp) {
        match op {
            PlacementOp::CreateBus => self.buses += 1,
            PlacementOp::CreatePoint => self.points += 1,
            PlacementOp::PlaceElement { .. } => self.elements += 1,
            _ => {}
        }
    }
}

impl PlacementRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<PlacementOp>) -> Self {
        let counts = Counts::of(&ops);
        Self { ops, counts }
    }

    /// Append an op.
    pub fn push(&mut self, op: PlacementOp) {
        self.counts.note(&op);
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn create_bus(&mut self) -> Ordinal {
        let ordinal = self.counts.buses;
        self.push(PlacementOp::CreateBus);
        ordinal
    }

    pub fn create_point(&mut self) -> Ordinal {
        let ordinal = self.counts.points;
        self.push(PlacementOp::CreatePoint);
        ordinal
    }

    /// Record a point created and bonded to `bus` in one go.
    pub fn pin_on(&mut self, bus: Ordinal) -> Ordinal {
        let point = self.create_point();
        self.push(PlacementOp::Bond { point, bus });
        point
    }

    pub fn place(&mut self, spec: ElementSpec<Ordinal>) -> Ordinal {
        let ordinal = self.counts.elements;
        self.push(PlacementOp::PlaceElement { spec });
        ordinal
    }

    // -- Encoding --

    pub fn to_ron(&self) -> Result<String, RecordError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| RecordError::Encode(e.to_string()))
    }

    pub fn from_ron(text: &str) -> Result<Self, RecordError> {
        let record: PlacementRecord =
            ron::from_str(text).map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(Self::from_ops(record.ops))
    }

    /// Compact binary encoding (bitcode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        bitcode::serialize(self).map_err(|e| RecordError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, RecordError> {
        let record: PlacementRecord =
            bitcode::deserialize(data).map_err(|e| RecordError::Decode(e.to_string()))?;
        Ok(Self::from_ops(record.ops))
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// A rebuilt circuit plus the runtime handle behind every ordinal.
#[derive(Debug, Default)]
pub struct Replayed {
    pub circuit: Circuit,
    pub buses: Vec<BusId>,
    pub points: Vec<PointId>,
    pub elements: Vec<ElementId>,
}

impl Replayed {
    pub fn bus(&self, ordinal: Ordinal) -> Option<BusId> {
        self.buses.get(ordinal).copied()
    }

    pub fn point(&self, ordinal: Ordinal) -> Option<PointId> {
        self.points.get(ordinal).copied()
    }

    pub fn element(&self, ordinal: Ordinal) -> Option<ElementId> {
        self.elements.get(ordinal).copied()
    }
}

/// Replay a record onto a fresh circuit. No ticks are run.
pub fn replay(record: &PlacementRecord) -> Result<Replayed, RecordError> {
    let mut out = Replayed::default();
    for (op, entry) in record.ops.iter().enumerate() {
        apply_op(&mut out, op, entry)?;
    }
    tracing::debug!(
        ops = record.len(),
        buses = out.buses.len(),
        points = out.points.len(),
        elements = out.elements.len(),
        "placement record replayed"
    );
    Ok(out)
}

fn lookup<T: Copy>(handles: &[T], op: usize, kind: &'static str, ordinal: Ordinal) -> Result<T, RecordError> {
    handles
        .get(ordinal)
        .copied()
        .ok_or(RecordError::UnknownOrdinal { op, kind, ordinal })
}

fn target(out: &Replayed, op: usize, target: TargetRef) -> Result<PowerTarget, RecordError> {
    Ok(match target {
        TargetRef::Point(p) => PowerTarget::Point(lookup(&out.points, op, "point", p)?),
        TargetRef::Bus(b) => PowerTarget::Bus(lookup(&out.buses, op, "bus", b)?),
    })
}

fn apply_op(out: &mut Replayed, op: usize, entry: &PlacementOp) -> Result<(), RecordError> {
    let circuit_err = |source| RecordError::Circuit { op, source };
    let bus = |out: &Replayed, ordinal| lookup(&out.buses, op, "bus", ordinal);
    let point = |out: &Replayed, ordinal| lookup(&out.points, op, "point", ordinal);

    match entry {
        PlacementOp::CreateBus => {
            let id = out.circuit.create_bus();
            out.buses.push(id);
        }
        PlacementOp::DestroyBus { bus: b } => {
            let id = bus(out, *b)?;
            out.circuit.destroy_bus(id).map_err(circuit_err)?;
        }
        PlacementOp::CreatePoint => {
            let id = out.circuit.create_point();
            out.points.push(id);
        }
        PlacementOp::Bond { point: p, bus: b } => {
            let (p, b) = (point(out, *p)?, bus(out, *b)?);
            out.circuit.bond(p, b).map_err(circuit_err)?;
        }
        PlacementOp::Unbond { point: p } => {
            let p = point(out, *p)?;
            out.circuit.unbond(p).map_err(circuit_err)?;
        }
        PlacementOp::DestroyPoint { point: p } => {
            let p = point(out, *p)?;
            out.circuit.destroy_point(p).map_err(circuit_err)?;
        }
        PlacementOp::AddBridge { a, b } => {
            let (a, b) = (bus(out, *a)?, bus(out, *b)?);
            out.circuit.add_bridge(a, b).map_err(circuit_err)?;
        }
        PlacementOp::RemoveBridge { a, b } => {
            let (a, b) = (bus(out, *a)?, bus(out, *b)?);
            out.circuit.remove_bridge(a, b).map_err(circuit_err)?;
        }
        PlacementOp::RegisterGround { bus: b } => {
            let b = bus(out, *b)?;
            out.circuit.register_ground(b).map_err(circuit_err)?;
        }
        PlacementOp::UnregisterGround { bus: b } => {
            let b = bus(out, *b)?;
            out.circuit.unregister_ground(b);
        }
        PlacementOp::PlaceElement { spec } => {
            let spec = spec.try_map_pins(|p| point(out, *p))?;
            let id = spec
                .place(&mut out.circuit)
                .map_err(|source| RecordError::Logic { op, source })?;
            out.elements.push(id);
        }
        PlacementOp::RemoveElement { element } => {
            let id = lookup(&out.elements, op, "element", *element)?;
            out.circuit.remove_element(id).map_err(circuit_err)?;
        }
        PlacementOp::Power { target: t } => {
            let t = target(out, op, *t)?;
            out.circuit.power(t).map_err(circuit_err)?;
        }
        PlacementOp::UnPower { target: t } => {
            let t = target(out, op, *t)?;
            out.circuit.unpower(t).map_err(circuit_err)?;
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use wirebench_logic::gates::{Gate, GateKind};
    use wirebench_logic::toggle::Toggle;

    /// NOT gate fed by a grounded, powered input bus.
    fn inverter_record() -> PlacementRecord {
        let mut r = PlacementRecord::new();
        let input = r.create_bus();
        let output = r.create_bus();
        r.push(PlacementOp::RegisterGround { bus: input });
        r.push(PlacementOp::RegisterGround { bus: output });
        let a = r.pin_on(input);
        let o = r.pin_on(output);
        r.place(ElementSpec::Gate {
            kind: GateKind::Not,
            inputs: vec![a],
            output: o,
        });
        r.push(PlacementOp::Power {
            target: TargetRef::Bus(input),
        });
        r
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    #[test]
    fn helpers_hand_out_ordinals() {
        let mut r = PlacementRecord::new();
        assert_eq!(r.create_bus(), 0);
        assert_eq!(r.create_bus(), 1);
        assert_eq!(r.create_point(), 0);
        assert_eq!(r.pin_on(1), 1);
        assert_eq!(r.place(ElementSpec::ConstantPower { output: 0 }), 0);
        assert_eq!(r.len(), 6);
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    #[test]
    #[traced_test]
    fn replay_rebuilds_a_working_board() {
        let mut replayed = replay(&inverter_record()).unwrap();
        assert_eq!(replayed.buses.len(), 2);
        assert_eq!(replayed.points.len(), 2);
        let gate = replayed.element(0).unwrap();
        assert!(replayed.circuit.element::<Gate>(gate).is_some());
        assert!(logs_contain("placement record replayed"));

        let out = replayed.point(1).unwrap();
        replayed.circuit.tick_n(4);
        assert!(!replayed.circuit.reads_power(out).unwrap());
        assert!(replayed.circuit.has_power(replayed.bus(0).unwrap()).unwrap());
    }

    #[test]
    fn replay_matches_hand_built_board() {
        let mut r = PlacementRecord::new();
        let a = r.create_bus();
        let b = r.create_bus();
        let c = r.create_bus();
        r.push(PlacementOp::AddBridge { a, b });
        r.push(PlacementOp::AddBridge { a: b, b: c });
        r.push(PlacementOp::RemoveBridge { a, b });
        let replayed = replay(&r).unwrap();

        let mut hand = Circuit::new();
        let ids: Vec<BusId> = (0..3).map(|_| hand.create_bus()).collect();
        hand.add_bridge(ids[0], ids[1]).unwrap();
        hand.add_bridge(ids[1], ids[2]).unwrap();
        hand.remove_bridge(ids[0], ids[1]).unwrap();

        for x in 0..3 {
            for y in 0..3 {
                assert_eq!(
                    replayed.circuit.connected(replayed.buses[x], replayed.buses[y]),
                    hand.connected(ids[x], ids[y])
                );
            }
        }
    }

    #[test]
    fn unknown_ordinal_is_reported() {
        let record = PlacementRecord::from_ops(vec![
            PlacementOp::CreateBus,
            PlacementOp::Bond { point: 0, bus: 0 },
        ]);
        let err = replay(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordError::UnknownOrdinal {
                op: 1,
                kind: "point",
                ordinal: 0
            }
        ));
    }

    #[test]
    fn circuit_errors_carry_the_op_index() {
        let record = PlacementRecord::from_ops(vec![
            PlacementOp::CreateBus,
            PlacementOp::CreateBus,
            PlacementOp::RemoveBridge { a: 0, b: 1 },
        ]);
        let err = replay(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Circuit {
                op: 2,
                source: CircuitError::BridgeNotFound { .. }
            }
        ));
    }

    #[test]
    fn ops_on_destroyed_objects_fail_like_live_calls() {
        let mut r = PlacementRecord::new();
        let b = r.create_bus();
        r.push(PlacementOp::DestroyBus { bus: b });
        r.push(PlacementOp::Power {
            target: TargetRef::Bus(b),
        });
        let err = replay(&r).unwrap_err();
        assert!(matches!(
            err,
            RecordError::Circuit {
                op: 2,
                source: CircuitError::UnknownBus(_)
            }
        ));
    }

    #[test]
    fn removed_element_is_gone_after_replay() {
        let mut r = PlacementRecord::new();
        let bus = r.create_bus();
        let out = r.pin_on(bus);
        let t = r.place(ElementSpec::Toggle {
            output: out,
            input: None,
            on: true,
        });
        r.push(PlacementOp::RemoveElement { element: t });
        let replayed = replay(&r).unwrap();
        let id = replayed.element(t).unwrap();
        assert!(replayed.circuit.element::<Toggle>(id).is_none());
    }

    #[test]
    fn invalid_spec_is_a_logic_error() {
        let mut r = PlacementRecord::new();
        let bus = r.create_bus();
        let p = r.pin_on(bus);
        r.place(ElementSpec::ByteInput {
            pins: vec![p],
            value: 0,
        });
        assert!(matches!(
            replay(&r).unwrap_err(),
            RecordError::Logic { op: 3, .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn ron_text_survives_reload() {
        let record = inverter_record();
        let text = record.to_ron().unwrap();
        assert!(text.contains("PlaceElement"));
        let mut back = PlacementRecord::from_ron(&text).unwrap();
        assert_eq!(back.ops, record.ops);
        // Ordinal counters are rebuilt from the ops.
        assert_eq!(back.create_bus(), 2);
    }

    #[test]
    fn bitcode_bytes_survive_reload() {
        let record = inverter_record();
        let bytes = record.to_bytes().unwrap();
        let back = PlacementRecord::from_bytes(&bytes).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            PlacementRecord::from_ron("not a record"),
            Err(RecordError::Decode(_))
        ));
    }
}
