//! Files and persisted history for Wirebench circuits.
//!
//! - [`config`] -- tick configuration in RON, TOML or JSON.
//! - [`record`] -- placement records: ordinal-referenced build histories
//!   replayed onto a fresh circuit, encoded as RON text or bitcode bytes.

pub mod config;
pub mod record;

pub use config::{ConfigError, Format, load_config};
pub use record::{PlacementOp, PlacementRecord, RecordError, Replayed, TargetRef, replay};
