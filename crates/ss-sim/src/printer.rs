//! Simulated printer host: drives controllers through the same lifecycle
//! a firmware host would.
//!
//! 1. load: build one [`StageSync`] per configured section
//! 2. connect: [`StageSync::start`] resolves handles and registers each
//!    controller's timer at `NOW`
//! 3. ready: one-shot synchronization
//! 4. run: fire timers and scenario events until `t_end` or shutdown
//!
//! Configuration and resolution faults go through [`escalate`] into the
//! [`ShutdownLatch`]; once latched, later phases do nothing.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ss_controls::{
    Fatal, GcodeSink, NEVER, Propagation, Scheduler, StageSync, TickOutcome, TickReport, escalate,
};
use ss_core::{Real, StageId, Time, ensure_non_negative};
use ss_project::{ScenarioDef, ScenarioEventDef, StageSyncFile};

use crate::error::{SimError, SimResult};
use crate::gcode::{CommandRecord, GcodeDispatcher};
use crate::reactor::Reactor;
use crate::registry::{HeaterRegistry, SimHeaterRef};
use crate::shutdown::ShutdownLatch;

pub type SimStageSync = StageSync<SimHeaterRef, SimHeaterRef, GcodeSink<GcodeDispatcher>>;

/// Everything observable about one simulated run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    /// Commands accepted by the host, in order.
    pub commands: Vec<CommandRecord>,
    pub ticks: usize,
    pub idle_ticks: usize,
    pub propagations: usize,
    pub propagation_faults: usize,
    pub shutdown: Option<String>,
    pub end_time: Time,
    /// Target of every heater still registered at the end.
    pub final_targets: Vec<(StageId, Real)>,
}

impl RunRecord {
    pub fn final_target(&self, id: &str) -> Option<Real> {
        self.final_targets
            .iter()
            .find(|(heater, _)| heater.as_str() == id)
            .map(|(_, target)| *target)
    }
}

#[derive(Debug, Default)]
struct TickStats {
    ticks: usize,
    idle: usize,
    propagations: usize,
    faults: usize,
}

impl TickStats {
    fn observe(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Idle(_) => self.idle += 1,
            TickOutcome::Debounced { .. } => {}
            TickOutcome::Propagated(p) => self.observe_propagation(p),
        }
    }

    fn observe_propagation(&mut self, propagation: &Propagation) {
        self.propagations += 1;
        self.faults += propagation.failures.len();
    }
}

#[derive(Debug)]
pub struct SimPrinter {
    registry: Rc<RefCell<HeaterRegistry>>,
    reactor: Reactor,
    gcode: GcodeDispatcher,
    latch: ShutdownLatch,
    controllers: Vec<Rc<RefCell<SimStageSync>>>,
    stats: Rc<RefCell<TickStats>>,
}

impl SimPrinter {
    pub fn new<I, S>(heaters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StageId>,
    {
        let registry = Rc::new(RefCell::new(HeaterRegistry::with_heaters(heaters)));
        let reactor = Reactor::new();
        let gcode = GcodeDispatcher::new(Rc::clone(&registry), reactor.clock());
        Self {
            registry,
            reactor,
            gcode,
            latch: ShutdownLatch::new(),
            controllers: Vec::new(),
            stats: Rc::default(),
        }
    }

    /// Build a controller for every section. Stops at the first invalid
    /// section and latches shutdown.
    pub fn load(&mut self, file: &StageSyncFile) -> bool {
        for def in &file.controllers {
            match def.to_settings() {
                Ok(settings) => {
                    let sink = GcodeSink::new(self.gcode.clone());
                    let sync = StageSync::new(settings, sink);
                    self.controllers.push(Rc::new(RefCell::new(sync)));
                }
                Err(fault) => {
                    self.shutdown(&Fatal::Config(fault));
                    return false;
                }
            }
        }
        true
    }

    /// Resolve every controller and start its periodic timer.
    ///
    /// A controller that fails to resolve gets no timer and latches
    /// shutdown; remaining controllers are not connected.
    pub fn connect(&mut self) -> bool {
        for controller in &self.controllers {
            if self.latch.is_shutdown() {
                return false;
            }
            let stats = Rc::clone(&self.stats);
            let started = StageSync::start(
                controller,
                &*self.registry.borrow(),
                &mut self.reactor,
                self.latch.clone(),
                move |report: &TickReport| stats.borrow_mut().observe(&report.outcome),
            );
            if started.is_none() {
                return false;
            }
        }
        !self.latch.is_shutdown()
    }

    /// Host-ready hook for every controller.
    pub fn ready(&mut self) {
        if self.latch.is_shutdown() {
            return;
        }
        for controller in &self.controllers {
            if let Some(propagation) = controller.borrow_mut().on_ready() {
                self.stats.borrow_mut().observe_propagation(&propagation);
            }
        }
    }

    /// Register scripted events as one-shot timers.
    ///
    /// Events registered before [`SimPrinter::connect`] run ahead of a
    /// controller tick due at the same instant.
    pub fn schedule_scenario(&mut self, scenario: &ScenarioDef) {
        for event in &scenario.events {
            let registry = Rc::clone(&self.registry);
            let event = event.clone();
            self.reactor.register_periodic(
                event.at_s(),
                Box::new(move |now| {
                    apply_event(&registry, &event, now);
                    NEVER
                }),
            );
        }
    }

    pub fn run_until(&mut self, t_end: Time) -> usize {
        self.reactor.run_until(t_end, &self.latch)
    }

    pub fn is_shutdown(&self) -> bool {
        self.latch.is_shutdown()
    }

    pub fn registry(&self) -> &Rc<RefCell<HeaterRegistry>> {
        &self.registry
    }

    pub fn now(&self) -> Time {
        self.reactor.now()
    }

    pub fn record(&self) -> RunRecord {
        let stats = self.stats.borrow();
        let registry = self.registry.borrow();
        let final_targets = registry
            .ids()
            .filter_map(|id| registry.snapshot(id).map(|h| (id.clone(), h.target())))
            .collect();
        RunRecord {
            commands: self.gcode.commands(),
            ticks: stats.ticks,
            idle_ticks: stats.idle,
            propagations: stats.propagations,
            propagation_faults: stats.faults,
            shutdown: self.latch.message(),
            end_time: self.reactor.now(),
            final_targets,
        }
    }

    fn shutdown(&self, fatal: &Fatal) {
        let mut latch = self.latch.clone();
        escalate(&mut latch, fatal);
    }
}

fn apply_event(registry: &RefCell<HeaterRegistry>, event: &ScenarioEventDef, now: Time) {
    let id = StageId::new(event.heater_id());
    match event {
        ScenarioEventDef::SetPrimaryTarget { target, .. } => {
            tracing::info!("[{:>8.3}] {} target -> {}", now, id, target);
            if let Err(err) = registry.borrow().set_target(&id, *target) {
                tracing::warn!("[{:>8.3}] {}", now, err);
            }
        }
        ScenarioEventDef::FailStage { .. } | ScenarioEventDef::RestoreStage { .. } => {
            let faulted = matches!(event, ScenarioEventDef::FailStage { .. });
            tracing::info!("[{:>8.3}] {} faulted={}", now, id, faulted);
            if !registry.borrow().set_faulted(&id, faulted) {
                tracing::warn!("[{:>8.3}] unknown heater {}", now, id);
            }
        }
        ScenarioEventDef::RemoveStage { .. } => {
            tracing::info!("[{:>8.3}] removing {}", now, id);
            if !registry.borrow_mut().remove(&id) {
                tracing::warn!("[{:>8.3}] unknown heater {}", now, id);
            }
        }
    }
}

/// Run a whole file through the host lifecycle.
///
/// `t_end` overrides the scenario's end time; one of the two is required.
pub fn run_file(file: &StageSyncFile, t_end: Option<Time>) -> SimResult<RunRecord> {
    let t_end = t_end
        .or_else(|| file.scenario.as_ref().map(|s| s.t_end_s))
        .ok_or(SimError::InvalidArg {
            what: "t_end (no scenario in file)",
        })?;
    let t_end = ensure_non_negative(t_end, "t_end")?;

    let mut printer = SimPrinter::new(file.heaters.iter().map(StageId::new));
    if printer.load(file) {
        if let Some(scenario) = &file.scenario {
            printer.schedule_scenario(scenario);
        }
        if printer.connect() {
            printer.ready();
        }
    }
    let fired = printer.run_until(t_end);
    tracing::info!(
        "Simulation finished at {:.3} after {} timer callbacks",
        printer.now(),
        fired
    );
    Ok(printer.record())
}

/// Load a YAML or JSON file and run it.
pub fn run_path(path: &Path, t_end: Option<Time>) -> SimResult<RunRecord> {
    let file = ss_project::load(path)?;
    run_file(&file, t_end)
}
