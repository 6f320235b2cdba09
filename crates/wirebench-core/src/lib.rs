//! Wirebench Core -- the power-propagation engine behind a circuit-building
//! sandbox.
//!
//! Electrically bonded points share a signal bus; buses joined by bridges
//! form one net. Every net's power state is the OR of its drivers, kept as
//! reference counts and changed only through a deferred queue. Elements run
//! in a two-phase tick, so the order they are visited in never matters.
//!
//! # Tick Pipeline
//!
//! Each call to [`circuit::Circuit::tick`]:
//!
//! 1. **Boundary** -- Apply queued registrations and deregistrations.
//! 2. **Compute** -- Elements read the state committed by the previous tick.
//! 3. **Commit** -- Clear last tick's `changed` flags, apply the power queue.
//! 4. **Push** -- Elements enqueue their new outputs.
//! 5. **Cleanse** -- Elements reset per-tick flags.
//! 6. **Bookkeeping** -- Deliver events and advance the tick counter.
//!
//! # Key Types
//!
//! - [`circuit::Circuit`] -- Owns a whole board and runs the tick.
//! - [`bus::BusRegistry`] -- Segments, points, bridges and derived nets.
//! - [`power::PowerManager`] -- Reference-counted drivers and the power queue.
//! - [`ground::GroundReachability`] -- Which segments reach a ground reference.
//! - [`scheduler::TickScheduler`] -- Live set, phase and iteration order.
//! - [`element::TickableElement`] -- The contract every component implements.
//! - [`sim::TickDriver`] -- Converts real time into tick bursts.

pub mod bus;
pub mod circuit;
pub mod dirty;
pub mod element;
pub mod error;
pub mod event;
pub mod ground;
pub mod id;
pub mod power;
pub mod rng;
pub mod scheduler;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
