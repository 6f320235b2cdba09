//! Error taxonomy shared by the registry, the power manager, the scheduler
//! and element implementations.

use crate::id::{BusId, ElementId, PointId};

// ---------------------------------------------------------------------------
// CircuitError
// ---------------------------------------------------------------------------

/// Errors raised by the shared circuit layers.
///
/// Misuse of the registry or power manager (unknown handles, missing bridges)
/// indicates a broken invariant in the calling layer and propagates to the
/// caller. Errors raised inside an element hook are caught by the scheduler
/// instead; see [`ElementError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    /// The point is not bonded to any bus.
    #[error("point {0:?} is not bonded to a bus")]
    Disconnected(PointId),
    /// The element is already live or already queued for registration.
    #[error("element {0:?} is already registered")]
    DoubleRegistration(ElementId),
    /// An unpower was applied to a driver with no outstanding power.
    #[error("power reference count underflow")]
    RefCountUnderflow,
    /// Indexed pin access outside the pin array.
    #[error("pin range {start}..{end} out of range for {len} pins")]
    IndexOutOfRange { start: usize, end: usize, len: usize },
    /// A processor's embedded program failed.
    #[error("interpreter fault: {0}")]
    InterpreterFault(String),
    /// The bus handle was destroyed or never existed.
    #[error("unknown bus {0:?}")]
    UnknownBus(BusId),
    /// The point handle was destroyed or never existed.
    #[error("unknown point {0:?}")]
    UnknownPoint(PointId),
    /// The element handle was removed or never existed.
    #[error("unknown element {0:?}")]
    UnknownElement(ElementId),
    /// No bridge is recorded between the two buses.
    #[error("no bridge between {a:?} and {b:?}")]
    BridgeNotFound { a: BusId, b: BusId },
}

/// Fieldless discriminant of [`CircuitError`], for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Disconnected,
    DoubleRegistration,
    RefCountUnderflow,
    IndexOutOfRange,
    InterpreterFault,
    UnknownBus,
    UnknownPoint,
    UnknownElement,
    BridgeNotFound,
}

impl CircuitError {
    /// Get the discriminant kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CircuitError::Disconnected(_) => ErrorKind::Disconnected,
            CircuitError::DoubleRegistration(_) => ErrorKind::DoubleRegistration,
            CircuitError::RefCountUnderflow => ErrorKind::RefCountUnderflow,
            CircuitError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            CircuitError::InterpreterFault(_) => ErrorKind::InterpreterFault,
            CircuitError::UnknownBus(_) => ErrorKind::UnknownBus,
            CircuitError::UnknownPoint(_) => ErrorKind::UnknownPoint,
            CircuitError::UnknownElement(_) => ErrorKind::UnknownElement,
            CircuitError::BridgeNotFound { .. } => ErrorKind::BridgeNotFound,
        }
    }
}

// ---------------------------------------------------------------------------
// ElementError
// ---------------------------------------------------------------------------

/// Errors returned from an element's `compute`, `push` or `cleanse` hook.
///
/// The scheduler isolates these per element: the fault is reported as an
/// event and the tick continues for every other element.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ElementError {
    #[error(transparent)]
    Circuit(#[from] CircuitError),
    #[error("{0}")]
    Custom(String),
}

impl ElementError {
    /// The underlying circuit error kind, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ElementError::Circuit(e) => Some(e.kind()),
            ElementError::Custom(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = CircuitError::IndexOutOfRange {
            start: 4,
            end: 9,
            len: 8,
        };
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert_eq!(err.to_string(), "pin range 4..9 out of range for 8 pins");
    }

    #[test]
    fn element_error_wraps_circuit_error() {
        let err: ElementError = CircuitError::RefCountUnderflow.into();
        assert_eq!(err.kind(), Some(ErrorKind::RefCountUnderflow));
        assert_eq!(err.to_string(), "power reference count underflow");
        assert_eq!(ElementError::Custom("boom".into()).kind(), None);
    }
}
