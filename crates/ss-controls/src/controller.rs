//! Synchronization controller.
//!
//! Each tick reads the primary heater's target and, when it has changed
//! since the last propagation, fans the scaled target out to every bound
//! stage in binding order:
//!
//! 1. read `(current, target)` from the primary
//! 2. skip if the target is absent, non-positive or not finite
//! 3. skip if the target equals the last propagated one (debounce)
//! 4. otherwise remember it and command `target * ratio` on each stage
//!
//! A failed command on one stage is reported and the remaining stages are
//! still commanded. The tick always asks to run again one period later.

use ss_core::{Real, StageId, Time};

use crate::actuator::ActuatorSink;
use crate::binding::{ResolvedStages, StageBinding};
use crate::error::{PropagationFault, TransientReadFault};
use crate::sampled::{NextTick, SampleConfig};
use crate::schedule::{report_propagation_fault, report_transient_read};
use crate::source::TemperatureSource;

/// A target that was accepted by one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTarget {
    pub stage_id: StageId,
    pub value: Real,
}

/// Result of fanning one primary target out to all stages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Propagation {
    pub target: Real,
    pub applied: Vec<AppliedTarget>,
    pub failures: Vec<PropagationFault>,
}

impl Propagation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The primary gave no usable target; nothing was commanded.
    Idle(TransientReadFault),
    /// Target unchanged since the last propagation.
    Debounced { target: Real },
    /// Target changed and was pushed to the stages.
    Propagated(Propagation),
}

/// Scheduling decision plus what happened on this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub next: NextTick,
    pub outcome: TickOutcome,
}

/// Active synchronization state for one primary heater.
#[derive(Debug)]
pub struct SyncController<P, H> {
    primary_id: StageId,
    primary: P,
    bindings: Vec<(StageBinding<H>, Real)>,
    sample: SampleConfig,
    last_target: Option<Real>,
}

impl<P: TemperatureSource, H> SyncController<P, H> {
    pub fn new(resolved: ResolvedStages<P, H>, sample: SampleConfig) -> Self {
        Self {
            primary_id: resolved.primary_id,
            primary: resolved.primary,
            bindings: resolved.bindings,
            sample,
            last_target: None,
        }
    }

    /// Run one synchronization check at host time `now`.
    pub fn tick<S>(&mut self, now: Time, sink: &mut S) -> TickReport
    where
        S: ActuatorSink<H> + ?Sized,
    {
        let next = self.sample.next_after(now);
        let outcome = match self.read_target(now) {
            Err(fault) => {
                report_transient_read(self.primary_id.as_str(), &fault);
                TickOutcome::Idle(fault)
            }
            Ok(target) if self.last_target == Some(target) => {
                tracing::debug!(
                    "StageSync: {} target unchanged at {}",
                    self.primary_id,
                    target
                );
                TickOutcome::Debounced { target }
            }
            Ok(target) => {
                self.last_target = Some(target);
                TickOutcome::Propagated(self.sync_temperatures(target, sink))
            }
        };
        tracing::debug!("StageSync: Scheduling next check at {}", next.at);
        TickReport { next, outcome }
    }

    /// Push `target * ratio` to every stage, isolating failures per stage.
    ///
    /// Does not touch the debounce state.
    pub fn sync_temperatures<S>(&self, target: Real, sink: &mut S) -> Propagation
    where
        S: ActuatorSink<H> + ?Sized,
    {
        tracing::info!(
            "StageSync: Heater {} target temperature: {}",
            self.primary_id,
            target
        );
        let mut propagation = Propagation {
            target,
            ..Default::default()
        };
        for (binding, ratio) in &self.bindings {
            let value = target * ratio;
            match sink.set_target(binding, value) {
                Ok(()) => propagation.applied.push(AppliedTarget {
                    stage_id: binding.id().clone(),
                    value,
                }),
                Err(source) => {
                    let fault = PropagationFault {
                        stage_id: binding.id().clone(),
                        target: value,
                        source,
                    };
                    report_propagation_fault(&fault);
                    propagation.failures.push(fault);
                }
            }
        }
        propagation
    }

    /// One-shot synchronization with whatever target was last seen.
    ///
    /// Returns `None` when no target has been seen yet.
    pub fn sync_last_target<S>(&self, sink: &mut S) -> Option<Propagation>
    where
        S: ActuatorSink<H> + ?Sized,
    {
        match self.last_target {
            Some(target) => Some(self.sync_temperatures(target, sink)),
            None => {
                tracing::info!(
                    "StageSync: no target known yet for {}, nothing to synchronize",
                    self.primary_id
                );
                None
            }
        }
    }

    fn read_target(&self, now: Time) -> Result<Real, TransientReadFault> {
        let reading = self.primary.get_temp(now)?;
        reading.commanded_target()
    }

    pub fn primary_id(&self) -> &StageId {
        &self.primary_id
    }

    pub fn bindings(&self) -> &[(StageBinding<H>, Real)] {
        &self.bindings
    }

    pub fn sample(&self) -> SampleConfig {
        self.sample
    }

    pub fn last_target(&self) -> Option<Real> {
        self.last_target
    }
}
