//! Sampled execution primitives for the synchronization loop.
//!
//! The controller runs on a fixed period. Every tick hands its next wake
//! time back to the host reactor, which re-arms the timer; the controller
//! never owns a timer itself.

use ss_core::{Real, Time, ensure_positive};

use crate::error::ConfigFault;

/// Default tick period in seconds.
pub const DEFAULT_PERIOD_S: Real = 1.0;

/// Shortest accepted tick period in seconds.
pub const MIN_PERIOD_S: Real = 1e-3;

/// Wake time that is never reached; returning it stops a periodic timer.
pub const NEVER: Time = Time::INFINITY;

/// Wake time for "as soon as possible".
pub const NOW: Time = 0.0;

/// Sample configuration for the synchronization loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    /// Sample period in seconds.
    period: Real,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// `ConfigFault::InvalidPeriod` unless `period` is finite and at least
    /// [`MIN_PERIOD_S`].
    pub fn new(period: Real) -> Result<Self, ConfigFault> {
        match ensure_positive(period, "period") {
            Ok(period) if period >= MIN_PERIOD_S => Ok(Self { period }),
            _ => Err(ConfigFault::InvalidPeriod { period }),
        }
    }

    pub fn period(&self) -> Real {
        self.period
    }

    /// Get the sample frequency in Hz.
    pub fn frequency(&self) -> Real {
        1.0 / self.period
    }

    /// Next wake time after a tick at `now`.
    ///
    /// The retry policy is flat: the same period after success, skip or
    /// failure.
    pub fn next_after(&self, now: Time) -> NextTick {
        NextTick {
            at: now + self.period,
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD_S,
        }
    }
}

/// Time at which the host should run the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextTick {
    pub at: Time,
}
