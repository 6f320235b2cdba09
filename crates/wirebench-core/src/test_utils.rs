//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::circuit::Circuit;
use crate::element::{ComputeContext, PushContext, TickableElement};
use crate::error::ElementError;
use crate::id::{BusId, PointId};
use crate::scheduler::Phase;

// ===========================================================================
// Board helpers
// ===========================================================================

/// A new bus registered as a ground reference.
pub fn grounded_bus(circuit: &mut Circuit) -> BusId {
    let bus = circuit.create_bus();
    // A freshly created bus always exists.
    let _ = circuit.register_ground(bus);
    bus
}

/// A new point bonded to `bus`.
pub fn pin_on(circuit: &mut Circuit, bus: BusId) -> PointId {
    let point = circuit.create_point();
    let _ = circuit.bond(point, bus);
    point
}

/// A grounded bus with one bonded pin.
pub fn grounded_pin(circuit: &mut Circuit) -> (BusId, PointId) {
    let bus = grounded_bus(circuit);
    let point = pin_on(circuit, bus);
    (bus, point)
}

// ===========================================================================
// Elements
// ===========================================================================

/// Logs every hook call as `"<hook> <tick>"`.
#[derive(Debug, Default)]
pub struct Recorder {
    pub log: Vec<String>,
    pub deregister_on_compute: bool,
}

impl Recorder {
    pub fn computes(&self) -> usize {
        self.log.iter().filter(|l| l.starts_with("compute")).count()
    }
}

impl TickableElement for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        self.log.push(format!("compute {}", ctx.tick()));
        if self.deregister_on_compute {
            ctx.deregister_self();
        }
        Ok(())
    }

    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        self.log.push(format!("push {}", ctx.tick()));
        Ok(())
    }

    fn cleanse(&mut self) -> Result<(), ElementError> {
        let tick = self
            .log
            .last()
            .and_then(|l| l.rsplit(' ').next())
            .unwrap_or("?")
            .to_string();
        self.log.push(format!("cleanse {tick}"));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Fails one hook every tick; the others succeed.
#[derive(Debug)]
pub struct Faulty {
    pub phase: Phase,
}

impl Faulty {
    pub fn new(phase: Phase) -> Self {
        Self { phase }
    }

    fn fail_in(&self, phase: Phase) -> Result<(), ElementError> {
        if self.phase == phase {
            return Err(ElementError::Custom(format!("always fails in {phase:?}")));
        }
        Ok(())
    }
}

impl Default for Faulty {
    fn default() -> Self {
        Self::new(Phase::Computing)
    }
}

impl TickableElement for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn compute(&mut self, _ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        self.fail_in(Phase::Computing)
    }

    fn push(&mut self, _ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        self.fail_in(Phase::Pushing)
    }

    fn cleanse(&mut self) -> Result<(), ElementError> {
        self.fail_in(Phase::Cleansing)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Copies one input pin to one output pin.
#[derive(Debug)]
pub struct Buffer {
    pub input: PointId,
    pub output: PointId,
    next: bool,
}

impl Buffer {
    pub fn new(input: PointId, output: PointId) -> Self {
        Self {
            input,
            output,
            next: false,
        }
    }
}

impl TickableElement for Buffer {
    fn name(&self) -> &str {
        "buffer"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        self.next = ctx.read(self.input)?;
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
