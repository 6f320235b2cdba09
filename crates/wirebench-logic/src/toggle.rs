//! Latching switch driven by UI events.

use wirebench_core::element::{ComputeContext, PushContext, TickableElement};
use wirebench_core::error::ElementError;
use wirebench_core::id::PointId;

/// A UI action waiting for the next compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleInput {
    Flip,
    Set(bool),
}

/// A latch whose state survives across ticks.
///
/// UI actions never touch the latch directly: they queue and are applied, in
/// order, at the start of the next compute. The output is driven while the
/// latch is on and, if the toggle has an input pin, that input reads power.
#[derive(Debug, Clone)]
pub struct Toggle {
    output: PointId,
    input: Option<PointId>,
    latched: bool,
    queued: Vec<ToggleInput>,
    next: bool,
}

impl Toggle {
    pub fn new(output: PointId) -> Self {
        Self {
            output,
            input: None,
            latched: false,
            queued: Vec::new(),
            next: false,
        }
    }

    /// Gate the output on a supply pin.
    pub fn with_input(mut self, input: PointId) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_state(mut self, on: bool) -> Self {
        self.latched = on;
        self
    }

    /// Queue a flip of the latch.
    pub fn toggle(&mut self) {
        self.queued.push(ToggleInput::Flip);
    }

    /// Queue setting the latch to a level.
    pub fn set(&mut self, on: bool) {
        self.queued.push(ToggleInput::Set(on));
    }

    /// Current latch state. Queued actions are not reflected yet.
    pub fn is_on(&self) -> bool {
        self.latched
    }

    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    pub fn output(&self) -> PointId {
        self.output
    }

    pub fn input(&self) -> Option<PointId> {
        self.input
    }
}

impl TickableElement for Toggle {
    fn name(&self) -> &str {
        "toggle"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        for action in self.queued.drain(..) {
            self.latched = match action {
                ToggleInput::Flip => !self.latched,
                ToggleInput::Set(on) => on,
            };
        }
        let supplied = match self.input {
            Some(pin) => ctx.read(pin)?,
            None => true,
        };
        self.next = self.latched && supplied;
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
