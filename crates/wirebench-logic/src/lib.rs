//! Element variants for Wirebench circuits.
//!
//! Every element implements [`TickableElement`] and is placed with
//! [`Circuit::add_element`]. All elements except the processor can also be
//! described by an [`ElementSpec`], a serializable value that names the
//! element kind and its pins.

pub mod constant;
pub mod gates;
pub mod indexed;
pub mod processor;
pub mod toggle;

use serde::{Deserialize, Serialize};
use wirebench_core::circuit::Circuit;
use wirebench_core::element::{IndexedPins, TickableElement};
use wirebench_core::id::{ElementId, PointId};

use constant::ConstantPower;
use gates::{Gate, GateKind};
use indexed::{ByteInput, Display};
use toggle::Toggle;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Construction errors for element variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogicError {
    #[error("{kind:?} gate cannot take {got} inputs")]
    Arity { kind: GateKind, got: usize },
    #[error("{element}: expected {expected} pins, got {got}")]
    Width {
        element: &'static str,
        expected: usize,
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// ElementSpec
// ---------------------------------------------------------------------------

/// Serializable description of a placeable element.
///
/// Generic over how pins are referenced: live [`PointId`]s at runtime, or
/// any stable reference (such as creation ordinals) in persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementSpec<P = PointId> {
    Gate {
        kind: GateKind,
        inputs: Vec<P>,
        output: P,
    },
    Toggle {
        output: P,
        input: Option<P>,
        on: bool,
    },
    ConstantPower {
        output: P,
    },
    ByteInput {
        pins: Vec<P>,
        value: u8,
    },
    Display {
        pins: Vec<P>,
    },
}

impl<P> ElementSpec<P> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ElementSpec::Gate { kind, .. } => kind.name(),
            ElementSpec::Toggle { .. } => "toggle",
            ElementSpec::ConstantPower { .. } => "constant_power",
            ElementSpec::ByteInput { .. } => "byte_input",
            ElementSpec::Display { .. } => "display",
        }
    }

    /// Every pin reference, inputs before outputs.
    pub fn pins(&self) -> Vec<&P> {
        match self {
            ElementSpec::Gate { inputs, output, .. } => {
                inputs.iter().chain(std::iter::once(output)).collect()
            }
            ElementSpec::Toggle { output, input, .. } => {
                input.iter().chain(std::iter::once(output)).collect()
            }
            ElementSpec::ConstantPower { output } => vec![output],
            ElementSpec::ByteInput { pins, .. } | ElementSpec::Display { pins } => {
                pins.iter().collect()
            }
        }
    }

    /// Translate every pin reference, failing on the first error.
    pub fn try_map_pins<Q, E>(
        &self,
        mut f: impl FnMut(&P) -> Result<Q, E>,
    ) -> Result<ElementSpec<Q>, E> {
        Ok(match self {
            ElementSpec::Gate {
                kind,
                inputs,
                output,
            } => ElementSpec::Gate {
                kind: *kind,
                inputs: inputs.iter().map(&mut f).collect::<Result<_, _>>()?,
                output: f(output)?,
            },
            ElementSpec::Toggle { output, input, on } => ElementSpec::Toggle {
                input: input.as_ref().map(&mut f).transpose()?,
                output: f(output)?,
                on: *on,
            },
            ElementSpec::ConstantPower { output } => ElementSpec::ConstantPower { output: f(output)? },
            ElementSpec::ByteInput { pins, value } => ElementSpec::ByteInput {
                pins: pins.iter().map(&mut f).collect::<Result<_, _>>()?,
                value: *value,
            },
            ElementSpec::Display { pins } => ElementSpec::Display {
                pins: pins.iter().map(&mut f).collect::<Result<_, _>>()?,
            },
        })
    }
}

impl ElementSpec<PointId> {
    /// Construct the element this spec describes.
    pub fn build(&self) -> Result<Box<dyn TickableElement>, LogicError> {
        Ok(match self {
            ElementSpec::Gate {
                kind,
                inputs,
                output,
            } => Box::new(Gate::new(*kind, inputs.clone(), *output)?),
            ElementSpec::Toggle { output, input, on } => {
                let mut toggle = Toggle::new(*output).with_state(*on);
                if let Some(input) = input {
                    toggle = toggle.with_input(*input);
                }
                Box::new(toggle)
            }
            ElementSpec::ConstantPower { output } => Box::new(ConstantPower::new(*output)),
            ElementSpec::ByteInput { pins, value } => {
                Box::new(ByteInput::new(IndexedPins::new(pins.clone()))?.with_value(*value))
            }
            ElementSpec::Display { pins } => Box::new(Display::new(IndexedPins::new(pins.clone()))?),
        })
    }

    /// Build the element, add it to the circuit and queue its registration.
    pub fn place(&self, circuit: &mut Circuit) -> Result<ElementId, LogicError> {
        let element = self.build()?;
        tracing::debug!(kind = self.kind_name(), pins = self.pins().len(), "placing element");
        Ok(circuit.add_boxed(element))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wirebench_core::test_utils::*;

    #[test]
    fn place_builds_matching_element() {
        let mut c = Circuit::new();
        let (_a, a) = grounded_pin(&mut c);
        let (_o, out) = grounded_pin(&mut c);
        let spec = ElementSpec::Gate {
            kind: GateKind::Not,
            inputs: vec![a],
            output: out,
        };
        let id = spec.place(&mut c).unwrap();
        let gate = c.element::<Gate>(id).unwrap();
        assert_eq!(gate.kind(), GateKind::Not);
        assert_eq!(gate.output(), out);
        assert_eq!(spec.kind_name(), "not");
    }

    #[test]
    fn invalid_spec_is_rejected_before_placement() {
        let mut c = Circuit::new();
        let (_o, out) = grounded_pin(&mut c);
        let spec = ElementSpec::ByteInput {
            pins: vec![out],
            value: 1,
        };
        assert!(spec.place(&mut c).is_err());
        assert_eq!(c.element_count(), 0);
    }

    #[test]
    fn pins_list_inputs_before_outputs() {
        let spec: ElementSpec<usize> = ElementSpec::Toggle {
            output: 1,
            input: Some(0),
            on: false,
        };
        assert_eq!(spec.pins(), vec![&0, &1]);
    }

    #[test]
    fn map_pins_translates_references() {
        let spec: ElementSpec<usize> = ElementSpec::Gate {
            kind: GateKind::And,
            inputs: vec![0, 1],
            output: 2,
        };
        let mapped = spec
            .try_map_pins(|i| Ok::<_, ()>(i * 10))
            .unwrap();
        assert_eq!(
            mapped,
            ElementSpec::Gate {
                kind: GateKind::And,
                inputs: vec![0, 10],
                output: 20,
            }
        );
        assert_eq!(spec.try_map_pins(|i| if *i == 1 { Err(*i) } else { Ok(*i) }), Err(1));
    }

    #[test]
    fn spec_serializes_with_json_and_bitcode() {
        let spec: ElementSpec<usize> = ElementSpec::ByteInput {
            pins: (0..8).collect(),
            value: 0x42,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: ElementSpec<usize> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);

        let bytes = bitcode::serialize(&spec).unwrap();
        let back: ElementSpec<usize> = bitcode::deserialize(&bytes).unwrap();
        assert_eq!(back, spec);
    }
}
