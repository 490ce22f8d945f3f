//! In-memory heater registry.
//!
//! The registry owns every heater. Controllers only receive weak
//! [`SimHeaterRef`] handles, so removing a heater leaves their handles
//! dangling rather than keeping it alive.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use ss_controls::{
    ActuatorError, Registry, SettableHeater, SourceError, TemperatureReading, TemperatureSource,
};
use ss_core::{Real, StageId, Time};

/// A heater with an idealized plant: the current temperature snaps to the
/// target whenever the target is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SimHeater {
    id: StageId,
    current: Real,
    target: Real,
    faulted: bool,
}

/// Ambient temperature every heater starts at.
pub const AMBIENT_C: Real = 25.0;

impl SimHeater {
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            current: AMBIENT_C,
            target: 0.0,
            faulted: false,
        }
    }

    pub fn id(&self) -> &StageId {
        &self.id
    }

    pub fn current(&self) -> Real {
        self.current
    }

    pub fn target(&self) -> Real {
        self.target
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn set_faulted(&mut self, faulted: bool) {
        self.faulted = faulted;
    }

    /// # Errors
    ///
    /// `ActuatorError::Rejected` while the heater is faulted.
    pub fn set_target(&mut self, value: Real) -> Result<(), ActuatorError> {
        if self.faulted {
            return Err(ActuatorError::Rejected {
                message: format!("heater '{}' is in fault state", self.id),
            });
        }
        self.target = value;
        self.current = if value > 0.0 { value } else { AMBIENT_C };
        Ok(())
    }

    pub fn reading(&self) -> TemperatureReading {
        let target = (self.target > 0.0).then_some(self.target);
        TemperatureReading::new(self.current, target)
    }
}

/// Non-owning handle to a registered heater.
#[derive(Debug, Clone)]
pub struct SimHeaterRef {
    id: StageId,
    heater: Weak<RefCell<SimHeater>>,
}

impl SimHeaterRef {
    pub fn id(&self) -> &StageId {
        &self.id
    }

    pub fn is_alive(&self) -> bool {
        self.heater.strong_count() > 0
    }
}

impl TemperatureSource for SimHeaterRef {
    fn get_temp(&self, _now: Time) -> Result<TemperatureReading, SourceError> {
        let heater = self
            .heater
            .upgrade()
            .ok_or_else(|| SourceError::new(format!("heater '{}' no longer exists", self.id)))?;
        let reading = heater.borrow().reading();
        Ok(reading)
    }
}

impl SettableHeater for SimHeaterRef {
    fn set_target_temp(&self, value: Real) -> Result<(), ActuatorError> {
        let heater = self.heater.upgrade().ok_or_else(|| ActuatorError::Unavailable {
            stage_id: self.id.clone(),
        })?;
        heater.borrow_mut().set_target(value)
    }
}

#[derive(Debug, Default)]
pub struct HeaterRegistry {
    heaters: BTreeMap<StageId, Rc<RefCell<SimHeater>>>,
}

impl HeaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heaters<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StageId>,
    {
        let mut registry = Self::new();
        for id in ids {
            registry.add(id.into());
        }
        registry
    }

    /// Register a heater. Returns `false` if the id was already taken.
    pub fn add(&mut self, id: StageId) -> bool {
        if self.heaters.contains_key(&id) {
            return false;
        }
        tracing::debug!("Registered heater {}", id);
        let heater = Rc::new(RefCell::new(SimHeater::new(id.clone())));
        self.heaters.insert(id, heater);
        true
    }

    /// Drop a heater. Outstanding handles stop resolving.
    pub fn remove(&mut self, id: &StageId) -> bool {
        let removed = self.heaters.remove(id).is_some();
        if removed {
            tracing::debug!("Removed heater {}", id);
        }
        removed
    }

    pub fn contains(&self, id: &StageId) -> bool {
        self.heaters.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &StageId> {
        self.heaters.keys()
    }

    pub fn handle(&self, id: &StageId) -> Option<SimHeaterRef> {
        self.heaters.get(id).map(|heater| SimHeaterRef {
            id: id.clone(),
            heater: Rc::downgrade(heater),
        })
    }

    /// Snapshot of one heater's state.
    pub fn snapshot(&self, id: &StageId) -> Option<SimHeater> {
        self.heaters.get(id).map(|heater| heater.borrow().clone())
    }

    /// # Errors
    ///
    /// `ActuatorError::Unavailable` for an unknown id, or whatever the
    /// heater itself rejects.
    pub fn set_target(&self, id: &StageId, value: Real) -> Result<(), ActuatorError> {
        let heater = self
            .heaters
            .get(id)
            .ok_or_else(|| ActuatorError::Unavailable {
                stage_id: id.clone(),
            })?;
        heater.borrow_mut().set_target(value)
    }

    /// Returns `false` for an unknown id.
    pub fn set_faulted(&self, id: &StageId, faulted: bool) -> bool {
        match self.heaters.get(id) {
            Some(heater) => {
                heater.borrow_mut().set_faulted(faulted);
                true
            }
            None => false,
        }
    }
}

impl Registry for HeaterRegistry {
    type Primary = SimHeaterRef;
    type Handle = SimHeaterRef;

    fn lookup_primary(&self, id: &StageId) -> Option<SimHeaterRef> {
        self.handle(id)
    }

    fn lookup_stage(&self, id: &StageId) -> Option<SimHeaterRef> {
        self.handle(id)
    }
}
