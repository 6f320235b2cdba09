//! Combinational gates: pure functions of the current inputs.

use serde::{Deserialize, Serialize};
use wirebench_core::element::{ComputeContext, PushContext, TickableElement};
use wirebench_core::error::ElementError;
use wirebench_core::id::PointId;

use crate::LogicError;

// ---------------------------------------------------------------------------
// Gate kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    And,
    Or,
    Xor,
    Not,
    Nand,
    Nor,
}

impl GateKind {
    pub const ALL: [GateKind; 6] = [
        GateKind::And,
        GateKind::Or,
        GateKind::Xor,
        GateKind::Not,
        GateKind::Nand,
        GateKind::Nor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GateKind::And => "and",
            GateKind::Or => "or",
            GateKind::Xor => "xor",
            GateKind::Not => "not",
            GateKind::Nand => "nand",
            GateKind::Nor => "nor",
        }
    }

    /// Whether `n` inputs is a valid wiring for this kind. NOT takes exactly
    /// one input, the rest take one or more.
    pub fn accepts(self, n: usize) -> bool {
        match self {
            GateKind::Not => n == 1,
            _ => n >= 1,
        }
    }

    /// Evaluate the gate. XOR is odd parity.
    pub fn evaluate(self, inputs: &[bool]) -> bool {
        let all = !inputs.is_empty() && inputs.iter().all(|v| *v);
        let any = inputs.iter().any(|v| *v);
        match self {
            GateKind::And => all,
            GateKind::Or => any,
            GateKind::Xor => inputs.iter().filter(|v| **v).count() % 2 == 1,
            GateKind::Not => !any,
            GateKind::Nand => !all,
            GateKind::Nor => !any,
        }
    }
}

// ---------------------------------------------------------------------------
// Gate element
// ---------------------------------------------------------------------------

/// A gate reading `inputs` and driving `output`.
#[derive(Debug, Clone)]
pub struct Gate {
    kind: GateKind,
    inputs: Vec<PointId>,
    output: PointId,
    next: bool,
}

impl Gate {
    pub fn new(kind: GateKind, inputs: Vec<PointId>, output: PointId) -> Result<Self, LogicError> {
        if !kind.accepts(inputs.len()) {
            return Err(LogicError::Arity {
                kind,
                got: inputs.len(),
            });
        }
        Ok(Self {
            kind,
            inputs,
            output,
            next: false,
        })
    }

    pub fn kind(&self) -> GateKind {
        self.kind
    }

    pub fn inputs(&self) -> &[PointId] {
        &self.inputs
    }

    pub fn output(&self) -> PointId {
        self.output
    }

    /// Value computed this tick, pushed next.
    pub fn next_output(&self) -> bool {
        self.next
    }
}

impl TickableElement for Gate {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        let values = self
            .inputs
            .iter()
            .map(|p| ctx.read(*p))
            .collect::<Result<Vec<_>, _>>()?;
        self.next = self.kind.evaluate(&values);
        Ok(())
    }

    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        ctx.set_power_state(self.output, self.next)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wirebench_core::circuit::Circuit;
    use wirebench_core::test_utils::*;

    // -----------------------------------------------------------------------
    // Truth tables
    // -----------------------------------------------------------------------

    #[test]
    fn two_input_truth_tables() {
        let rows = [[false, false], [false, true], [true, false], [true, true]];
        let table = |kind: GateKind| rows.map(|r| kind.evaluate(&r));
        assert_eq!(table(GateKind::And), [false, false, false, true]);
        assert_eq!(table(GateKind::Or), [false, true, true, true]);
        assert_eq!(table(GateKind::Xor), [false, true, true, false]);
        assert_eq!(table(GateKind::Nand), [true, true, true, false]);
        assert_eq!(table(GateKind::Nor), [true, false, false, false]);
    }

    #[test]
    fn not_inverts() {
        assert!(GateKind::Not.evaluate(&[false]));
        assert!(!GateKind::Not.evaluate(&[true]));
    }

    #[test]
    fn xor_is_odd_parity() {
        assert!(GateKind::Xor.evaluate(&[true, true, true]));
        assert!(!GateKind::Xor.evaluate(&[true, true, false, false]));
    }

    #[test]
    fn arity_is_checked() {
        let mut c = Circuit::new();
        let (_b, p) = grounded_pin(&mut c);
        let (_b, q) = grounded_pin(&mut c);
        assert!(matches!(
            Gate::new(GateKind::Not, vec![p, q], q),
            Err(LogicError::Arity { kind: GateKind::Not, got: 2 })
        ));
        assert!(Gate::new(GateKind::And, vec![], q).is_err());
        assert!(Gate::new(GateKind::And, vec![p], q).is_ok());
    }

    // -----------------------------------------------------------------------
    // In a circuit
    // -----------------------------------------------------------------------

    #[test]
    fn nor_gate_drives_output_when_inputs_idle() {
        let mut c = Circuit::new();
        let (_a, a) = grounded_pin(&mut c);
        let (_b, b) = grounded_pin(&mut c);
        let (_o, out) = grounded_pin(&mut c);
        let gate = c.add_element(Gate::new(GateKind::Nor, vec![a, b], out).unwrap());

        c.tick_n(2);
        assert!(c.reads_power(out).unwrap());
        assert!(c.element::<Gate>(gate).unwrap().next_output());

        c.power(a).unwrap();
        c.tick_n(3);
        assert!(!c.reads_power(out).unwrap());
        assert_eq!(c.power_manager().driver_count(out.into()), 0);
    }

    #[test]
    fn disconnected_input_is_a_fault_not_a_crash() {
        let mut c = Circuit::new();
        let loose = c.create_point();
        let (_o, out) = grounded_pin(&mut c);
        c.add_element(Gate::new(GateKind::Or, vec![loose], out).unwrap());
        c.tick();
        let report = c.tick();
        assert_eq!(report.faults, 1);
    }
}
