//! Configuration validation logic.

use crate::schema::{ScenarioDef, ScenarioEventDef, StageSyncFile};
use ss_controls::ConfigFault;
use ss_core::ensure_non_negative;
use std::collections::HashSet;

pub const LATEST_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing reference: {id} in {context}")]
    MissingReference { id: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid stagesync section '{heater}': {source}")]
    Config {
        heater: String,
        #[source]
        source: ConfigFault,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_file(file: &StageSyncFile) -> Result<(), ValidationError> {
    if file.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: file.version,
        });
    }

    let mut heater_ids = HashSet::new();
    for heater in &file.heaters {
        if !heater_ids.insert(heater.trim()) {
            return Err(ValidationError::DuplicateId {
                id: heater.clone(),
                context: "heaters".to_string(),
            });
        }
    }

    let mut primaries = HashSet::new();
    for controller in &file.controllers {
        // Parsing the section surfaces every ratio/stage fault.
        let settings = controller
            .to_settings()
            .map_err(|source| ValidationError::Config {
                heater: controller.heater.clone(),
                source,
            })?;
        if !primaries.insert(settings.primary_id().clone()) {
            return Err(ValidationError::DuplicateId {
                id: controller.heater.clone(),
                context: "controllers".to_string(),
            });
        }
    }

    if let Some(scenario) = &file.scenario {
        validate_scenario(scenario, &heater_ids)?;
    }

    Ok(())
}

fn validate_scenario(
    scenario: &ScenarioDef,
    heater_ids: &HashSet<&str>,
) -> Result<(), ValidationError> {
    if ensure_non_negative(scenario.t_end_s, "t_end_s").is_err() {
        return Err(ValidationError::InvalidValue {
            field: "scenario t_end_s".to_string(),
            value: scenario.t_end_s.to_string(),
            reason: "must be non-negative and finite".to_string(),
        });
    }

    for (index, event) in scenario.events.iter().enumerate() {
        let at_s = event.at_s();
        if ensure_non_negative(at_s, "at_s").is_err() {
            return Err(ValidationError::InvalidValue {
                field: format!("scenario event {index} at_s"),
                value: at_s.to_string(),
                reason: "must be non-negative and finite".to_string(),
            });
        }

        if let ScenarioEventDef::SetPrimaryTarget { target, .. } = event
            && !target.is_finite()
        {
            return Err(ValidationError::InvalidValue {
                field: format!("scenario event {index} target"),
                value: target.to_string(),
                reason: "must be finite".to_string(),
            });
        }

        if !heater_ids.contains(event.heater_id().trim()) {
            return Err(ValidationError::MissingReference {
                id: event.heater_id().to_string(),
                context: format!("scenario event {index}"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ControllerDef;

    fn controller(heater: &str, stages: &str, ratios: &str) -> ControllerDef {
        ControllerDef {
            heater: heater.to_string(),
            stages: stages.into(),
            temp_ratio: ratios.into(),
            period_s: 1.0,
        }
    }

    fn file(controllers: Vec<ControllerDef>) -> StageSyncFile {
        StageSyncFile {
            version: 1,
            heaters: vec!["extruder".to_string(), "stage1".to_string()],
            controllers,
            scenario: None,
        }
    }

    #[test]
    fn valid_file_passes() {
        let f = file(vec![controller("extruder", "stage1", "0.8")]);
        assert!(validate_file(&f).is_ok());
    }

    #[test]
    fn ratio_fault_names_section() {
        let f = file(vec![controller("extruder", "stage1", "2.5")]);
        let err = validate_file(&f).unwrap_err();
        match err {
            ValidationError::Config { heater, source } => {
                assert_eq!(heater, "extruder");
                assert!(matches!(source, ConfigFault::RatioOutOfBounds { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_primary_rejected() {
        let f = file(vec![
            controller("extruder", "stage1", "0.8"),
            controller(" extruder", "stage2", "0.8"),
        ]);
        assert!(matches!(
            validate_file(&f),
            Err(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn newer_version_rejected() {
        let mut f = file(vec![]);
        f.version = LATEST_VERSION + 1;
        assert!(matches!(
            validate_file(&f),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn scenario_must_reference_known_heaters() {
        let mut f = file(vec![controller("extruder", "stage1", "0.8")]);
        f.scenario = Some(ScenarioDef {
            t_end_s: 3.0,
            events: vec![ScenarioEventDef::FailStage {
                at_s: 1.0,
                stage: "stage9".to_string(),
            }],
        });
        assert!(matches!(
            validate_file(&f),
            Err(ValidationError::MissingReference { .. })
        ));
    }

    #[test]
    fn vanishing_period_rejected() {
        let mut c = controller("extruder", "stage1", "0.8");
        c.period_s = 1e-12;
        assert!(matches!(
            validate_file(&file(vec![c])),
            Err(ValidationError::Config {
                source: ConfigFault::InvalidPeriod { .. },
                ..
            })
        ));
    }

    #[test]
    fn negative_period_rejected() {
        let mut c = controller("extruder", "stage1", "0.8");
        c.period_s = -1.0;
        let err = validate_file(&file(vec![c])).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Config {
                source: ConfigFault::InvalidPeriod { .. },
                ..
            }
        ));
    }
}
