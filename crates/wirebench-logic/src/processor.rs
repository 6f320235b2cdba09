//! Programmable element backed by an external interpreter.
//!
//! The interpreter is a black box: once per compute it receives the input
//! pin levels and returns the next output levels. Failures never leave the
//! processor. They are recorded, raised as [`SimEvent::RuntimeError`] and
//! shown on the optional errored indicator pin.

use wirebench_core::element::{ComputeContext, IndexedPins, PushContext, TickableElement};
use wirebench_core::error::{CircuitError, ElementError};
use wirebench_core::event::SimEvent;
use wirebench_core::id::PointId;

use crate::LogicError;

/// Most recent error messages kept per processor.
pub const MAX_ERRORS: usize = 32;

// ---------------------------------------------------------------------------
// Interpreter contract
// ---------------------------------------------------------------------------

/// Errors an interpreter can raise from a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    #[error("line {line}: {message}")]
    Runtime { line: usize, message: String },
    #[error("program halted")]
    Halted,
    #[error("expected {expected} outputs, got {got}")]
    OutputWidth { expected: usize, got: usize },
}

impl From<InterpreterError> for CircuitError {
    fn from(err: InterpreterError) -> Self {
        CircuitError::InterpreterFault(err.to_string())
    }
}

/// A program executed one step per tick over boolean pin arrays.
pub trait Interpreter: std::fmt::Debug {
    fn input_width(&self) -> usize;

    fn output_width(&self) -> usize;

    /// Consume the current inputs and produce the next outputs.
    fn step(&mut self, inputs: &[bool]) -> Result<Vec<bool>, InterpreterError>;
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Processor {
    interpreter: Box<dyn Interpreter>,
    inputs: IndexedPins,
    outputs: IndexedPins,
    error_pin: Option<PointId>,
    next: Vec<bool>,
    errors: Vec<String>,
    errored: bool,
}

impl Processor {
    pub fn new(
        interpreter: Box<dyn Interpreter>,
        inputs: IndexedPins,
        outputs: IndexedPins,
    ) -> Result<Self, LogicError> {
        if interpreter.input_width() != inputs.len() {
            return Err(LogicError::Width {
                element: "processor inputs",
                expected: interpreter.input_width(),
                got: inputs.len(),
            });
        }
        if interpreter.output_width() != outputs.len() {
            return Err(LogicError::Width {
                element: "processor outputs",
                expected: interpreter.output_width(),
                got: outputs.len(),
            });
        }
        let next = vec![false; outputs.len()];
        Ok(Self {
            interpreter,
            inputs,
            outputs,
            error_pin: None,
            next,
            errors: Vec::new(),
            errored: false,
        })
    }

    /// Drive `pin` while the processor is in the errored state.
    pub fn with_error_pin(mut self, pin: PointId) -> Self {
        self.error_pin = Some(pin);
        self
    }

    /// Recorded error messages, oldest first.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errored(&self) -> bool {
        self.errored
    }

    /// Forget recorded errors and drop the indicator on the next push.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.errored = false;
    }

    pub fn interpreter(&self) -> &dyn Interpreter {
        self.interpreter.as_ref()
    }

    fn record(&mut self, ctx: &mut ComputeContext<'_>, err: InterpreterError) {
        let message = CircuitError::from(err).to_string();
        tracing::warn!(element = ?ctx.element(), tick = ctx.tick(), error = %message, "processor runtime error");
        if self.errors.len() == MAX_ERRORS {
            self.errors.remove(0);
        }
        self.errors.push(message.clone());
        self.errored = true;
        ctx.emit(SimEvent::RuntimeError {
            element: ctx.element(),
            message,
            tick: ctx.tick(),
        });
    }
}

impl TickableElement for Processor {
    fn name(&self) -> &str {
        "processor"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        let inputs = self.inputs.values(&ctx.view(), 0, self.inputs.len())?;
        match self.interpreter.step(&inputs) {
            Ok(outputs) if outputs.len() == self.outputs.len() => self.next = outputs,
            // Outputs hold their last good levels.
            Ok(outputs) => self.record(
                ctx,
                InterpreterError::OutputWidth {
                    expected: self.outputs.len(),
                    got: outputs.len(),
                },
            ),
            Err(err) => self.record(ctx, err),
        }
        Ok(())
    }

    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        self.outputs
            .set_values(ctx, 0, self.outputs.len(), &self.next)?;
        if let Some(pin) = self.error_pin {
            ctx.set_power_state(pin, self.errored)?;
        }
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
