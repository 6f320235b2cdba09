//! A source that asserts power once and then leaves the live set.

use wirebench_core::element::{ComputeContext, PushContext, TickableElement};
use wirebench_core::error::ElementError;
use wirebench_core::id::PointId;

/// Powers its output on the first push after registration and deregisters
/// itself in the same tick. The drive stays until the output point is
/// destroyed.
#[derive(Debug, Clone)]
pub struct ConstantPower {
    output: PointId,
    fired: bool,
}

impl ConstantPower {
    pub fn new(output: PointId) -> Self {
        Self {
            output,
            fired: false,
        }
    }

    pub fn output(&self) -> PointId {
        self.output
    }

    /// Whether the power has been asserted.
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl TickableElement for ConstantPower {
    fn name(&self) -> &str {
        "constant_power"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        ctx.deregister_self();
        Ok(())
    }

    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        if !self.fired {
            ctx.power(self.output.into())?;
            self.fired = true;
            tracing::debug!(element = ?ctx.element(), "constant power asserted");
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
