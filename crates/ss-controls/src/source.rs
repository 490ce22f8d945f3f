//! Primary temperature source.
//!
//! The primary heater is read once per tick; only its target matters for
//! synchronization, the current temperature is carried for logging.

use ss_core::{Real, Time};

use crate::error::{SourceError, TransientReadFault};

/// One reading of the primary heater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub current: Real,
    pub target: Option<Real>,
}

impl TemperatureReading {
    pub fn new(current: Real, target: Option<Real>) -> Self {
        Self { current, target }
    }

    /// The target to synchronize to, if the primary is commanding one.
    ///
    /// A missing, non-positive or non-finite target is not an error of the
    /// controller; the tick is simply skipped.
    pub fn commanded_target(&self) -> Result<Real, TransientReadFault> {
        match self.target {
            None => Err(TransientReadFault::NoTarget),
            Some(target) if !target.is_finite() || target <= 0.0 => {
                Err(TransientReadFault::InvalidTarget { target })
            }
            Some(target) => Ok(target),
        }
    }
}

/// Read access to the primary heater.
pub trait TemperatureSource {
    /// Non-blocking read of `(current, target)` at host time `now`.
    fn get_temp(&self, now: Time) -> Result<TemperatureReading, SourceError>;
}

impl<T: TemperatureSource + ?Sized> TemperatureSource for Box<T> {
    fn get_temp(&self, now: Time) -> Result<TemperatureReading, SourceError> {
        (**self).get_temp(now)
    }
}
