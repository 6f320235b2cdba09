//! Multi-bit elements over indexed pin arrays. Bit `i` lives on pin `i`,
//! least significant first.

use wirebench_core::element::{ComputeContext, IndexedPins, PushContext, TickableElement};
use wirebench_core::error::ElementError;
use wirebench_core::sim::Ticks;

use crate::LogicError;

// ---------------------------------------------------------------------------
// Bit helpers
// ---------------------------------------------------------------------------

pub fn byte_to_bits(value: u8) -> [bool; 8] {
    std::array::from_fn(|i| value & (1 << i) != 0)
}

/// Pack up to 64 bits, least significant first. Extra bits are ignored.
pub fn bits_to_value(bits: &[bool]) -> u64 {
    bits.iter()
        .take(64)
        .enumerate()
        .fold(0, |acc, (i, on)| if *on { acc | (1 << i) } else { acc })
}

// ---------------------------------------------------------------------------
// ByteInput
// ---------------------------------------------------------------------------

/// Writes an externally set byte onto eight pins.
#[derive(Debug, Clone)]
pub struct ByteInput {
    pins: IndexedPins,
    value: u8,
    queued: Option<u8>,
}

impl ByteInput {
    pub fn new(pins: IndexedPins) -> Result<Self, LogicError> {
        if pins.len() != 8 {
            return Err(LogicError::Width {
                element: "byte_input",
                expected: 8,
                got: pins.len(),
            });
        }
        Ok(Self {
            pins,
            value: 0,
            queued: None,
        })
    }

    pub fn with_value(mut self, value: u8) -> Self {
        self.value = value;
        self
    }

    /// Queue a new value for the next compute. Only the latest call counts.
    pub fn set_value(&mut self, value: u8) {
        self.queued = Some(value);
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn pins(&self) -> &IndexedPins {
        &self.pins
    }
}

impl TickableElement for ByteInput {
    fn name(&self) -> &str {
        "byte_input"
    }

    fn compute(&mut self, _ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        if let Some(value) = self.queued.take() {
            self.value = value;
        }
        Ok(())
    }

    fn push(&mut self, ctx: &mut PushContext<'_>) -> Result<(), ElementError> {
        self.pins.set_values(ctx, 0, 8, &byte_to_bits(self.value))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Reads up to 64 pins into a number.
///
/// `updated` rises in the compute that sees a new value and is cleared in
/// cleanse; [`Display::last_update`] keeps the tick it last rose in.
#[derive(Debug, Clone)]
pub struct Display {
    pins: IndexedPins,
    value: u64,
    updated: bool,
    last_update: Option<Ticks>,
}

impl Display {
    pub fn new(pins: IndexedPins) -> Result<Self, LogicError> {
        if pins.is_empty() || pins.len() > 64 {
            return Err(LogicError::Width {
                element: "display",
                expected: 64,
                got: pins.len(),
            });
        }
        Ok(Self {
            pins,
            value: 0,
            updated: false,
            last_update: None,
        })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn last_update(&self) -> Option<Ticks> {
        self.last_update
    }

    pub fn pins(&self) -> &IndexedPins {
        &self.pins
    }
}

impl TickableElement for Display {
    fn name(&self) -> &str {
        "display"
    }

    fn compute(&mut self, ctx: &mut ComputeContext<'_>) -> Result<(), ElementError> {
        let bits = self.pins.values(&ctx.view(), 0, self.pins.len())?;
        let value = bits_to_value(&bits);
        if value != self.value {
            self.value = value;
            self.updated = true;
            self.last_update = Some(ctx.tick());
        }
        Ok(())
    }

    fn cleanse(&mut self) -> Result<(), ElementError> {
        self.updated = false;
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
    use wirebench_core::id::PointId;
    use wirebench_core::test_utils::*;

    fn grounded_pins(c: &mut Circuit, n: usize) -> Vec<PointId> {
        (0..n).map(|_| grounded_pin(c).1).collect()
    }

    #[test]
    fn bit_helpers_are_lsb_first() {
        assert_eq!(
            byte_to_bits(0b0000_0101),
            [true, false, true, false, false, false, false, false]
        );
        assert_eq!(bits_to_value(&[true, false, true]), 5);
        assert_eq!(bits_to_value(&byte_to_bits(0xA7)), 0xA7);
        assert_eq!(bits_to_value(&[]), 0);
    }

    #[test]
    fn widths_are_validated() {
        let mut c = Circuit::new();
        let pins = grounded_pins(&mut c, 4);
        assert!(matches!(
            ByteInput::new(IndexedPins::new(pins.clone())),
            Err(LogicError::Width { expected: 8, got: 4, .. })
        ));
        assert!(Display::new(IndexedPins::new(pins)).is_ok());
        assert!(Display::new(IndexedPins::new(Vec::new())).is_err());
    }

    #[test]
    fn byte_input_feeds_display() {
        let mut c = Circuit::new();
        let pins = grounded_pins(&mut c, 8);
        let input = c.add_element(ByteInput::new(IndexedPins::new(pins.clone())).unwrap());
        let display = c.add_element(Display::new(IndexedPins::new(pins)).unwrap());

        c.element_mut::<ByteInput>(input).unwrap().set_value(0x5A);
        // Compute applies the value, commit next tick, display reads after.
        c.tick_n(3);
        let d = c.element::<Display>(display).unwrap();
        assert_eq!(d.value(), 0x5A);
        assert_eq!(d.last_update(), Some(2));
        assert!(!d.is_updated());

        c.element_mut::<ByteInput>(input).unwrap().set_value(0x01);
        c.tick_n(3);
        assert_eq!(c.element::<Display>(display).unwrap().value(), 0x01);
        assert_eq!(c.element::<ByteInput>(input).unwrap().value(), 0x01);
    }

    #[test]
    fn display_ignores_repeated_values() {
        let mut c = Circuit::new();
        let pins = grounded_pins(&mut c, 2);
        c.power(pins[1]).unwrap();
        let display = c.add_element(Display::new(IndexedPins::new(pins)).unwrap());
        c.tick_n(2);
        assert_eq!(c.element::<Display>(display).unwrap().last_update(), Some(1));
        c.tick_n(4);
        let d = c.element::<Display>(display).unwrap();
        assert_eq!(d.value(), 2);
        assert_eq!(d.last_update(), Some(1));
    }
}
