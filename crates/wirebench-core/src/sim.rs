//! Tick timing: the tick counter type, tick configuration and the real-time
//! driver that turns elapsed wall time into tick bursts.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::scheduler::TickReport;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Q32.32 fixed-point seconds. Keeps the driver's accumulator exact and
/// platform independent.
pub type Fixed64 = I32F32;

/// Highest accepted tick rate.
pub const MAX_TICKS_PER_SECOND: u32 = 10_000;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Errors from [`TickConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickConfigError {
    #[error("ticks_per_second must be between 1 and {max}, got {got}")]
    TickRate { got: u32, max: u32 },
    #[error("burst must be at least 1")]
    ZeroBurst,
}

/// Real-time pacing knobs consumed by [`TickDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Frames per real-time second.
    pub ticks_per_second: u32,
    /// Ticks executed per frame.
    pub burst: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            burst: 1,
        }
    }
}

impl TickConfig {
    pub fn validate(&self) -> Result<(), TickConfigError> {
        if self.ticks_per_second == 0 || self.ticks_per_second > MAX_TICKS_PER_SECOND {
            return Err(TickConfigError::TickRate {
                got: self.ticks_per_second,
                max: MAX_TICKS_PER_SECOND,
            });
        }
        if self.burst == 0 {
            return Err(TickConfigError::ZeroBurst);
        }
        Ok(())
    }

    /// Length of one frame in seconds.
    pub fn interval(&self) -> Fixed64 {
        Fixed64::from_num(1) / Fixed64::from_num(self.ticks_per_second.max(1))
    }
}

// ---------------------------------------------------------------------------
// TickDriver
// ---------------------------------------------------------------------------

/// Accumulates elapsed real time and runs `burst` ticks per elapsed frame
/// interval. Leftover time carries over to the next call.
#[derive(Debug, Clone)]
pub struct TickDriver {
    config: TickConfig,
    interval: Fixed64,
    accumulator: Fixed64,
}

impl TickDriver {
    pub fn new(config: TickConfig) -> Result<Self, TickConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            interval: config.interval(),
            accumulator: Fixed64::ZERO,
        })
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Unconsumed time, always below one interval after `advance` returns.
    pub fn accumulator(&self) -> Fixed64 {
        self.accumulator
    }

    /// Feed `dt` seconds of real time. Negative input is ignored.
    pub fn advance(&mut self, circuit: &mut Circuit, dt: Fixed64) -> Vec<TickReport> {
        if dt > Fixed64::ZERO {
            self.accumulator = self.accumulator.saturating_add(dt);
        }
        let mut reports = Vec::new();
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            reports.extend(self.frame(circuit));
        }
        reports
    }

    /// Run one frame immediately, ignoring the accumulator.
    pub fn frame(&self, circuit: &mut Circuit) -> Vec<TickReport> {
        circuit.tick_n(u64::from(self.config.burst))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    #[test]
    fn default_config_is_valid() {
        let config = TickConfig::default();
        assert_eq!(config.ticks_per_second, 60);
        assert_eq!(config.burst, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_rate = TickConfig {
            ticks_per_second: 0,
            burst: 1,
        };
        assert!(matches!(
            zero_rate.validate(),
            Err(TickConfigError::TickRate { got: 0, .. })
        ));
        let too_fast = TickConfig {
            ticks_per_second: MAX_TICKS_PER_SECOND + 1,
            burst: 1,
        };
        assert!(too_fast.validate().is_err());
        let zero_burst = TickConfig {
            ticks_per_second: 10,
            burst: 0,
        };
        assert_eq!(zero_burst.validate(), Err(TickConfigError::ZeroBurst));
        assert!(TickDriver::new(zero_burst).is_err());
    }

    #[test]
    fn driver_runs_burst_per_interval() {
        let mut circuit = Circuit::new();
        let mut driver = TickDriver::new(TickConfig {
            ticks_per_second: 10,
            burst: 3,
        })
        .unwrap();

        // 0.25s at 10 frames/s = 2 frames, 0.05s left over.
        let reports = driver.advance(&mut circuit, secs(0.25));
        assert_eq!(reports.len(), 6);
        assert_eq!(circuit.tick_count(), 6);
        assert!(driver.accumulator() < secs(0.1));

        // Leftover plus 0.05s completes a third frame.
        let reports = driver.advance(&mut circuit, secs(0.05));
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].tick, 6);
    }

    #[test]
    fn negative_dt_is_ignored() {
        let mut circuit = Circuit::new();
        let mut driver = TickDriver::new(TickConfig::default()).unwrap();
        assert!(driver.advance(&mut circuit, secs(-1.0)).is_empty());
        assert_eq!(driver.accumulator(), Fixed64::ZERO);
    }

    #[test]
    fn frame_ignores_accumulator() {
        let mut circuit = Circuit::new();
        let driver = TickDriver::new(TickConfig {
            ticks_per_second: 1,
            burst: 4,
        })
        .unwrap();
        assert_eq!(driver.frame(&mut circuit).len(), 4);
        assert_eq!(circuit.tick_count(), 4);
    }

    #[test]
    fn config_roundtrips_through_json_with_defaults() {
        let config: TickConfig = serde_json::from_str(r#"{ "burst": 4 }"#).unwrap();
        assert_eq!(config.ticks_per_second, 60);
        assert_eq!(config.burst, 4);
    }
}
