//! Actuator command sinks.
//!
//! A sink applies one secondary stage's target. The host either receives a
//! textual setpoint command through its script runner ([`GcodeSink`]) or
//! the handle is set directly ([`DirectSink`]).

use ss_core::Real;

use crate::binding::StageBinding;
use crate::error::ActuatorError;

/// Applies a target temperature to a bound secondary stage.
pub trait ActuatorSink<H> {
    /// Fire-and-forget setpoint command; must not block.
    fn set_target(&mut self, stage: &StageBinding<H>, value: Real) -> Result<(), ActuatorError>;
}

impl<H, S: ActuatorSink<H> + ?Sized> ActuatorSink<H> for &mut S {
    fn set_target(&mut self, stage: &StageBinding<H>, value: Real) -> Result<(), ActuatorError> {
        (**self).set_target(stage, value)
    }
}

impl<H, S: ActuatorSink<H> + ?Sized> ActuatorSink<H> for Box<S> {
    fn set_target(&mut self, stage: &StageBinding<H>, value: Real) -> Result<(), ActuatorError> {
        (**self).set_target(stage, value)
    }
}

/// Host scripting collaborator (G-code dispatcher).
pub trait ScriptRunner {
    fn run_script(&mut self, script: &str) -> Result<(), ActuatorError>;
}

/// Render the host's setpoint command for one stage.
///
/// Integral values keep one decimal (`100.0`) so the text matches what the
/// host prints for its own float parameters.
///
/// ```
/// use ss_controls::set_heater_temperature_command;
///
/// assert_eq!(
///     set_heater_temperature_command("stage_a", 107.5),
///     r#"SET_HEATER_TEMPERATURE HEATER="stage_a" TARGET="107.5""#
/// );
/// ```
pub fn set_heater_temperature_command(stage_id: &str, value: Real) -> String {
    format!(
        "SET_HEATER_TEMPERATURE HEATER=\"{}\" TARGET=\"{}\"",
        stage_id,
        format_target(value)
    )
}

fn format_target(value: Real) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Sink that issues `SET_HEATER_TEMPERATURE` through a script runner.
///
/// Works for any handle type since the command addresses the stage by id.
#[derive(Debug, Default)]
pub struct GcodeSink<R> {
    runner: R,
}

impl<R: ScriptRunner> GcodeSink<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: ScriptRunner, H> ActuatorSink<H> for GcodeSink<R> {
    fn set_target(&mut self, stage: &StageBinding<H>, value: Real) -> Result<(), ActuatorError> {
        let command = set_heater_temperature_command(stage.id().as_str(), value);
        self.runner.run_script(&command)?;
        tracing::info!("StageSync G-code command sent successfully: {}", command);
        Ok(())
    }
}

/// Handle that can take a target temperature directly.
pub trait SettableHeater {
    fn set_target_temp(&self, value: Real) -> Result<(), ActuatorError>;
}

/// Sink that calls the handle's own setter.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectSink;

impl<H: SettableHeater> ActuatorSink<H> for DirectSink {
    fn set_target(&mut self, stage: &StageBinding<H>, value: Real) -> Result<(), ActuatorError> {
        stage.handle().set_target_temp(value)?;
        tracing::debug!("StageSync set {} target to {}", stage.id(), value);
        Ok(())
    }
}
