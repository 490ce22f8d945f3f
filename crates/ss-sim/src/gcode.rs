//! G-code dispatcher for the simulated host.
//!
//! Understands the one command the controller emits:
//!
//! ```text
//! SET_HEATER_TEMPERATURE HEATER=<name> [TARGET=<value>]
//! ```
//!
//! Parameter values may be double-quoted. A missing `TARGET` means 0, as on
//! the real host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ss_controls::{ActuatorError, ScriptRunner};
use ss_core::{Real, StageId, Time};

use crate::registry::HeaterRegistry;

const SET_HEATER_TEMPERATURE: &str = "SET_HEATER_TEMPERATURE";

/// One accepted command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub at: Time,
    pub heater: StageId,
    pub target: Real,
    pub script: String,
}

/// Parse a `SET_HEATER_TEMPERATURE` line into `(heater, target)`.
///
/// # Errors
///
/// `ActuatorError::Malformed` for any other command, a missing `HEATER`,
/// or a `TARGET` that is not a finite number.
pub fn parse_set_heater_temperature(script: &str) -> Result<(StageId, Real), ActuatorError> {
    let malformed = || ActuatorError::Malformed {
        script: script.to_string(),
    };
    let mut words = script.split_whitespace();
    match words.next() {
        Some(cmd) if cmd.eq_ignore_ascii_case(SET_HEATER_TEMPERATURE) => {}
        _ => return Err(malformed()),
    }

    let mut heater = None;
    let mut target = 0.0;
    for word in words {
        let (key, value) = word.split_once('=').ok_or_else(malformed)?;
        let value = value.trim_matches('"');
        match key.to_ascii_uppercase().as_str() {
            "HEATER" => heater = Some(StageId::new(value)),
            "TARGET" => {
                target = value.parse::<Real>().map_err(|_| malformed())?;
                if !target.is_finite() {
                    return Err(malformed());
                }
            }
            _ => return Err(malformed()),
        }
    }

    match heater {
        Some(id) if !id.is_empty() => Ok((id, target)),
        _ => Err(malformed()),
    }
}

/// Script runner backed by the heater registry.
///
/// Clones share the registry, the clock and the command log, so one log
/// collects the commands of every controller on the host.
#[derive(Debug, Clone)]
pub struct GcodeDispatcher {
    registry: Rc<RefCell<HeaterRegistry>>,
    clock: Rc<Cell<Time>>,
    log: Rc<RefCell<Vec<CommandRecord>>>,
}

impl GcodeDispatcher {
    pub fn new(registry: Rc<RefCell<HeaterRegistry>>, clock: Rc<Cell<Time>>) -> Self {
        Self {
            registry,
            clock,
            log: Rc::default(),
        }
    }

    /// Accepted commands so far, in execution order.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.log.borrow().clone()
    }

    pub fn command_count(&self) -> usize {
        self.log.borrow().len()
    }
}

impl ScriptRunner for GcodeDispatcher {
    fn run_script(&mut self, script: &str) -> Result<(), ActuatorError> {
        let (heater, target) = parse_set_heater_temperature(script)?;
        self.registry.borrow().set_target(&heater, target)?;

        let at = self.clock.get();
        tracing::debug!("[{:>8.3}] {}", at, script);
        self.log.borrow_mut().push(CommandRecord {
            at,
            heater,
            target,
            script: script.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_controls::set_heater_temperature_command;

    fn dispatcher(ids: &[&str]) -> (GcodeDispatcher, Rc<RefCell<HeaterRegistry>>) {
        let registry = Rc::new(RefCell::new(HeaterRegistry::with_heaters(
            ids.iter().copied(),
        )));
        let clock = Rc::new(Cell::new(2.5));
        (GcodeDispatcher::new(Rc::clone(&registry), clock), registry)
    }

    #[test]
    fn parses_controller_output() {
        let script = set_heater_temperature_command("extruder_stage1", 160.0);
        let (id, target) = parse_set_heater_temperature(&script).unwrap();
        assert_eq!(id.as_str(), "extruder_stage1");
        assert_eq!(target, 160.0);
    }

    #[test]
    fn parses_unquoted_and_defaults_target() {
        let (id, target) = parse_set_heater_temperature("set_heater_temperature heater=bed").unwrap();
        assert_eq!(id.as_str(), "bed");
        assert_eq!(target, 0.0);

        let (_, target) =
            parse_set_heater_temperature("SET_HEATER_TEMPERATURE HEATER=bed TARGET=60.5").unwrap();
        assert_eq!(target, 60.5);
    }

    #[test]
    fn rejects_malformed_lines() {
        for script in [
            "M104 S200",
            "SET_HEATER_TEMPERATURE TARGET=100",
            "SET_HEATER_TEMPERATURE HEATER=bed TARGET=hot",
            "SET_HEATER_TEMPERATURE HEATER=bed TARGET=inf",
            "SET_HEATER_TEMPERATURE HEATER=bed SPEED=1",
            "SET_HEATER_TEMPERATURE HEATER",
        ] {
            assert!(
                matches!(
                    parse_set_heater_temperature(script),
                    Err(ActuatorError::Malformed { .. })
                ),
                "{script}"
            );
        }
    }

    #[test]
    fn run_script_sets_heater_and_logs() {
        let (mut gcode, registry) = dispatcher(&["stage1"]);
        gcode
            .run_script(&set_heater_temperature_command("stage1", 96.0))
            .unwrap();

        let heater = registry.borrow().snapshot(&"stage1".into()).unwrap();
        assert_eq!(heater.target(), 96.0);

        let log = gcode.commands();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].at, 2.5);
        assert_eq!(log[0].heater.as_str(), "stage1");
    }

    #[test]
    fn unknown_heater_is_unavailable_and_not_logged() {
        let (mut gcode, _registry) = dispatcher(&["stage1"]);
        let err = gcode
            .run_script(&set_heater_temperature_command("stage9", 96.0))
            .unwrap_err();
        assert_eq!(
            err,
            ActuatorError::Unavailable {
                stage_id: "stage9".into()
            }
        );
        assert_eq!(gcode.command_count(), 0);
    }
}
