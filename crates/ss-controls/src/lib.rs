//! Stage temperature synchronization for stagesync.
//!
//! One primary heater drives a set of secondary stages: whenever the
//! primary's target temperature changes, each stage is commanded to
//! `target * ratio`. The crate is host-independent; everything it needs
//! from the firmware host is injected through small collaborator traits.
//!
//! # Architecture
//!
//! - [`RatioTable`]: validated stage → ratio mapping, built at load time
//! - [`resolve_all`]: all-or-nothing binding of stage ids to host handles
//! - [`SyncController`]: the periodic tick with debounce and per-stage
//!   fault isolation
//! - [`StageSync`]: `Uninitialized → Active` lifecycle around the controller;
//!   [`StageSync::start`] connects and schedules it on a host [`Scheduler`]
//!
//! # Collaborators
//!
//! - [`TemperatureSource`]: primary heater reads
//! - [`Registry`]: connect-time handle lookup
//! - [`ActuatorSink`]: setpoint commands ([`GcodeSink`], [`DirectSink`])
//! - [`Scheduler`]: periodic timers
//! - [`FaultSink`]: host shutdown for fatal faults

pub mod actuator;
pub mod binding;
pub mod controller;
pub mod error;
pub mod ratio;
pub mod sampled;
pub mod schedule;
pub mod source;
pub mod stage_sync;

pub use actuator::{
    ActuatorSink, DirectSink, GcodeSink, ScriptRunner, SettableHeater,
    set_heater_temperature_command,
};
pub use binding::{Registry, ResolvedStages, StageBinding, resolve, resolve_all, resolve_primary};
pub use controller::{AppliedTarget, Propagation, SyncController, TickOutcome, TickReport};
pub use error::{
    ActuatorError, ConfigFault, Fatal, PropagationFault, ResolutionFault, SourceError, SyncResult,
    TransientReadFault,
};
pub use ratio::{RATIO_MAX, RATIO_MIN, RatioEntry, RatioTable};
pub use sampled::{DEFAULT_PERIOD_S, MIN_PERIOD_S, NEVER, NOW, NextTick, SampleConfig};
pub use schedule::{
    FaultSink, LOG_PREFIX, Scheduler, TimerCallback, TimerHandle, escalate,
    report_propagation_fault,
};
pub use source::{TemperatureReading, TemperatureSource};
pub use stage_sync::{ControllerSettings, StageSync, SyncState};

pub use ss_core::{Real, StageId, Time};
