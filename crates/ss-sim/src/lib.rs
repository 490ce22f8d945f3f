//! Reference firmware host for stagesync.
//!
//! Provides the collaborators a real printer host would supply, in memory:
//! - heater registry with weak handles
//! - single-threaded timer reactor
//! - G-code dispatcher for `SET_HEATER_TEMPERATURE`
//! - shutdown latch
//! - connect/ready lifecycle and scripted scenarios

pub mod error;
pub mod gcode;
pub mod printer;
pub mod reactor;
pub mod registry;
pub mod shutdown;

pub use error::{SimError, SimResult};
pub use gcode::{CommandRecord, GcodeDispatcher, parse_set_heater_temperature};
pub use printer::{RunRecord, SimPrinter, SimStageSync, run_file, run_path};
pub use reactor::Reactor;
pub use registry::{HeaterRegistry, SimHeater, SimHeaterRef};
pub use shutdown::ShutdownLatch;
