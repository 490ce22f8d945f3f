//! Controller lifecycle: `Uninitialized` until the host connects, then
//! `Active` for the rest of the process. There is no way back.

use std::cell::RefCell;
use std::rc::Rc;

use ss_core::{Real, StageId, Time};

use crate::actuator::ActuatorSink;
use crate::binding::{Registry, StageBinding, resolve_all};
use crate::controller::{Propagation, SyncController, TickReport};
use crate::error::{ConfigFault, Fatal, SyncResult};
use crate::ratio::RatioTable;
use crate::sampled::{NEVER, NOW, SampleConfig};
use crate::schedule::{FaultSink, Scheduler, TimerHandle, escalate};
use crate::source::TemperatureSource;

/// Validated configuration of one synchronization group.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    primary_id: StageId,
    table: RatioTable,
    sample: SampleConfig,
}

impl ControllerSettings {
    /// # Errors
    ///
    /// `ConfigFault::PrimaryAsStage` if the primary is also listed as a stage.
    pub fn new(
        primary_id: StageId,
        table: RatioTable,
        sample: SampleConfig,
    ) -> Result<Self, ConfigFault> {
        if table.contains(primary_id.as_str()) {
            return Err(ConfigFault::PrimaryAsStage {
                stage_id: primary_id,
            });
        }
        Ok(Self {
            primary_id,
            table,
            sample,
        })
    }

    /// Build settings from the raw option text of a configuration section.
    pub fn from_options(
        primary: &str,
        stages: &str,
        temp_ratio: &str,
        period: Real,
    ) -> Result<Self, ConfigFault> {
        let table = RatioTable::parse_lists(stages, temp_ratio)?;
        let sample = SampleConfig::new(period)?;
        Self::new(StageId::new(primary), table, sample)
    }

    pub fn primary_id(&self) -> &StageId {
        &self.primary_id
    }

    pub fn table(&self) -> &RatioTable {
        &self.table
    }

    pub fn sample(&self) -> SampleConfig {
        self.sample
    }
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Active,
}

/// One synchronization group with its injected command sink.
///
/// # Example
///
/// ```
/// use ss_controls::{
///     ActuatorError, ActuatorSink, ControllerSettings, Registry, SourceError, StageBinding,
///     StageId, StageSync, SyncState, TemperatureReading, TemperatureSource,
/// };
///
/// struct Primary;
/// impl TemperatureSource for Primary {
///     fn get_temp(&self, _now: f64) -> Result<TemperatureReading, SourceError> {
///         Ok(TemperatureReading::new(25.0, Some(200.0)))
///     }
/// }
///
/// struct Host;
/// impl Registry for Host {
///     type Primary = Primary;
///     type Handle = ();
///     fn lookup_primary(&self, _id: &StageId) -> Option<Primary> {
///         Some(Primary)
///     }
///     fn lookup_stage(&self, _id: &StageId) -> Option<()> {
///         Some(())
///     }
/// }
///
/// #[derive(Default)]
/// struct Log(Vec<(String, f64)>);
/// impl ActuatorSink<()> for Log {
///     fn set_target(&mut self, s: &StageBinding<()>, v: f64) -> Result<(), ActuatorError> {
///         self.0.push((s.id().to_string(), v));
///         Ok(())
///     }
/// }
///
/// let settings = ControllerSettings::from_options("extruder", "a, b", "0.5, 1.0", 1.0).unwrap();
/// let mut sync = StageSync::new(settings, Log::default());
/// sync.connect(&Host).unwrap();
/// assert_eq!(sync.state(), SyncState::Active);
///
/// let report = sync.tick(0.0).unwrap();
/// assert_eq!(report.next.at, 1.0);
/// assert_eq!(sync.sink().0, [("a".to_string(), 100.0), ("b".to_string(), 200.0)]);
/// ```
#[derive(Debug)]
pub struct StageSync<P, H, S> {
    settings: ControllerSettings,
    sink: S,
    controller: Option<SyncController<P, H>>,
}

impl<P, H, S> StageSync<P, H, S>
where
    P: TemperatureSource,
    S: ActuatorSink<H>,
{
    pub fn new(settings: ControllerSettings, sink: S) -> Self {
        tracing::info!("StageSync heater found: {}", settings.primary_id());
        Self {
            settings,
            sink,
            controller: None,
        }
    }

    /// Resolve every handle and become `Active`.
    ///
    /// # Errors
    ///
    /// `Fatal::Resolution` when any id is missing (the controller stays
    /// `Uninitialized`), `Fatal::AlreadyActive` on a second call.
    pub fn connect<R>(&mut self, registry: &R) -> SyncResult<()>
    where
        R: Registry<Primary = P, Handle = H> + ?Sized,
    {
        if self.controller.is_some() {
            return Err(Fatal::AlreadyActive {
                stage_id: self.settings.primary_id().clone(),
            });
        }
        let resolved = resolve_all(self.settings.primary_id(), self.settings.table(), registry)?;
        self.controller = Some(SyncController::new(resolved, self.settings.sample()));
        tracing::info!(
            "StageSync: {} active with {} stage(s)",
            self.settings.primary_id(),
            self.settings.table().len()
        );
        Ok(())
    }

    /// One-shot synchronization when the host reports ready.
    ///
    /// Applies the last seen target so stages are not left stale until the
    /// first periodic tick. `None` if nothing was applied.
    pub fn on_ready(&mut self) -> Option<Propagation> {
        match &self.controller {
            Some(controller) => controller.sync_last_target(&mut self.sink),
            None => {
                tracing::error!(
                    "StageSync Heater {} is not available.",
                    self.settings.primary_id()
                );
                None
            }
        }
    }

    /// Periodic tick.
    ///
    /// # Errors
    ///
    /// `Fatal::NotActive` if `connect` never succeeded.
    pub fn tick(&mut self, now: Time) -> SyncResult<TickReport> {
        match &mut self.controller {
            Some(controller) => Ok(controller.tick(now, &mut self.sink)),
            None => Err(Fatal::NotActive {
                stage_id: self.settings.primary_id().clone(),
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        if self.controller.is_some() {
            SyncState::Active
        } else {
            SyncState::Uninitialized
        }
    }

    pub fn last_target(&self) -> Option<Real> {
        self.controller.as_ref().and_then(SyncController::last_target)
    }

    pub fn bindings(&self) -> &[(StageBinding<H>, Real)] {
        self.controller
            .as_ref()
            .map(SyncController::bindings)
            .unwrap_or_default()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<P, H, S> StageSync<P, H, S>
where
    P: TemperatureSource + 'static,
    H: 'static,
    S: ActuatorSink<H> + 'static,
{
    /// Connect handler for single-threaded hosts.
    ///
    /// Resolves the controller and registers its periodic tick at [`NOW`].
    /// On a resolution fault the fault goes to `faults`, nothing is
    /// registered and `None` is returned. The registered timer hands every
    /// report to `observe` and re-arms at `report.next`; a fatal tick result
    /// is escalated and retires the timer.
    pub fn start<R, C, F, O>(
        this: &Rc<RefCell<Self>>,
        registry: &R,
        scheduler: &mut C,
        mut faults: F,
        mut observe: O,
    ) -> Option<TimerHandle>
    where
        R: Registry<Primary = P, Handle = H> + ?Sized,
        C: Scheduler + ?Sized,
        F: FaultSink + 'static,
        O: FnMut(&TickReport) + 'static,
    {
        let connected = this.borrow_mut().connect(registry);
        if let Err(fatal) = connected {
            escalate(&mut faults, &fatal);
            return None;
        }

        let sync = Rc::clone(this);
        let handle = scheduler.register_periodic(
            NOW,
            Box::new(move |now| {
                let result = sync.borrow_mut().tick(now);
                match result {
                    Ok(report) => {
                        observe(&report);
                        report.next.at
                    }
                    Err(fatal) => {
                        escalate(&mut faults, &fatal);
                        NEVER
                    }
                }
            }),
        );
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::TickOutcome;
    use crate::error::{ActuatorError, ResolutionFault, SourceError};
    use crate::schedule::TimerCallback;
    use crate::source::TemperatureReading;
    use std::collections::HashSet;

    struct FixedPrimary(Real);

    impl TemperatureSource for FixedPrimary {
        fn get_temp(&self, _now: Time) -> Result<TemperatureReading, SourceError> {
            Ok(TemperatureReading::new(20.0, Some(self.0)))
        }
    }

    struct Host {
        present: HashSet<&'static str>,
        target: Real,
    }

    impl Registry for Host {
        type Primary = FixedPrimary;
        type Handle = ();

        fn lookup_primary(&self, id: &StageId) -> Option<FixedPrimary> {
            self.present
                .contains(id.as_str())
                .then(|| FixedPrimary(self.target))
        }

        fn lookup_stage(&self, id: &StageId) -> Option<()> {
            self.present.contains(id.as_str()).then_some(())
        }
    }

    #[derive(Default)]
    struct Count(usize);

    impl ActuatorSink<()> for Count {
        fn set_target(&mut self, _: &StageBinding<()>, _: Real) -> Result<(), ActuatorError> {
            self.0 += 1;
            Ok(())
        }
    }

    fn settings() -> ControllerSettings {
        ControllerSettings::from_options("extruder", "left, right", "0.9, 1.1", 1.0).unwrap()
    }

    #[test]
    fn primary_listed_as_stage_is_rejected() {
        let err =
            ControllerSettings::from_options("extruder", "extruder, left", "1, 1", 1.0).unwrap_err();
        assert_eq!(
            err,
            ConfigFault::PrimaryAsStage {
                stage_id: StageId::new("extruder")
            }
        );
    }

    #[test]
    fn missing_stage_keeps_controller_uninitialized() {
        let host = Host {
            present: ["extruder", "right"].into_iter().collect(),
            target: 200.0,
        };
        let mut sync: StageSync<FixedPrimary, (), Count> =
            StageSync::new(settings(), Count::default());

        let err = sync.connect(&host).unwrap_err();

        assert_eq!(
            err,
            Fatal::Resolution(ResolutionFault::StageNotFound {
                stage_id: StageId::new("left")
            })
        );
        assert_eq!(sync.state(), SyncState::Uninitialized);
        assert!(sync.bindings().is_empty());
        assert!(matches!(sync.tick(0.0), Err(Fatal::NotActive { .. })));
        assert_eq!(sync.sink().0, 0);
    }

    #[test]
    fn connect_happens_once() {
        let host = Host {
            present: ["extruder", "left", "right"].into_iter().collect(),
            target: 200.0,
        };
        let mut sync = StageSync::new(settings(), Count::default());
        sync.connect(&host).unwrap();
        assert_eq!(sync.state(), SyncState::Active);
        assert!(matches!(
            sync.connect(&host),
            Err(Fatal::AlreadyActive { .. })
        ));
    }

    #[test]
    fn ready_before_first_tick_applies_nothing() {
        let host = Host {
            present: ["extruder", "left", "right"].into_iter().collect(),
            target: 200.0,
        };
        let mut sync = StageSync::new(settings(), Count::default());
        sync.connect(&host).unwrap();

        assert!(sync.on_ready().is_none());

        let report = sync.tick(0.0).unwrap();
        assert!(matches!(report.outcome, TickOutcome::Propagated(_)));
        assert_eq!(sync.last_target(), Some(200.0));

        let ready = sync.on_ready().unwrap();
        assert_eq!(ready.applied.len(), 2);
        assert_eq!(sync.sink().0, 4);
    }

    #[derive(Default)]
    struct CountingScheduler {
        first_runs: Vec<Time>,
        callbacks: Vec<TimerCallback>,
    }

    impl Scheduler for CountingScheduler {
        fn register_periodic(&mut self, first_run: Time, callback: TimerCallback) -> TimerHandle {
            self.first_runs.push(first_run);
            self.callbacks.push(callback);
            TimerHandle(self.callbacks.len() as u64 - 1)
        }

        fn unregister(&mut self, _handle: TimerHandle) {}
    }

    #[derive(Clone, Default)]
    struct SharedLatch(Rc<RefCell<Vec<String>>>);

    impl FaultSink for SharedLatch {
        fn invoke_shutdown(&mut self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn start_without_stage_registers_nothing() {
        let host = Host {
            present: ["extruder", "right"].into_iter().collect(),
            target: 200.0,
        };
        let sync = Rc::new(RefCell::new(StageSync::new(settings(), Count::default())));
        let mut scheduler = CountingScheduler::default();
        let latch = SharedLatch::default();

        let handle = StageSync::start(&sync, &host, &mut scheduler, latch.clone(), |_| {});

        assert!(handle.is_none());
        assert!(scheduler.first_runs.is_empty());
        assert_eq!(sync.borrow().state(), SyncState::Uninitialized);
        assert_eq!(*latch.0.borrow(), ["StageSync: stage 'left' not found"]);
    }

    #[test]
    fn start_registers_one_tick_at_now() {
        let host = Host {
            present: ["extruder", "left", "right"].into_iter().collect(),
            target: 200.0,
        };
        let sync = Rc::new(RefCell::new(StageSync::new(settings(), Count::default())));
        let mut scheduler = CountingScheduler::default();
        let latch = SharedLatch::default();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&reports);

        let handle = StageSync::start(&sync, &host, &mut scheduler, latch.clone(), move |r| {
            seen.borrow_mut().push(r.clone())
        });

        assert_eq!(handle, Some(TimerHandle(0)));
        assert_eq!(scheduler.first_runs, [NOW]);
        assert_eq!(sync.borrow().state(), SyncState::Active);

        let callback = &mut scheduler.callbacks[0];
        assert_eq!(callback(0.0), 1.0);
        assert_eq!(callback(1.0), 2.0);

        assert_eq!(reports.borrow().len(), 2);
        assert!(matches!(reports.borrow()[0].outcome, TickOutcome::Propagated(_)));
        assert_eq!(sync.borrow().sink().0, 2);
        assert!(latch.0.borrow().is_empty());
    }
}
