//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use ss_controls::{ConfigFault, ControllerSettings, DEFAULT_PERIOD_S, RatioTable, SampleConfig};
use ss_core::StageId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSyncFile {
    pub version: u32,
    /// Heaters present in the host registry (used by the simulated host).
    #[serde(default)]
    pub heaters: Vec<String>,
    #[serde(default)]
    pub controllers: Vec<ControllerDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<ScenarioDef>,
}

/// One `[stagesync <heater>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerDef {
    /// Primary heater id.
    pub heater: String,
    pub stages: ListDef,
    pub temp_ratio: ListDef,
    #[serde(default = "default_period_s")]
    pub period_s: f64,
}

fn default_period_s() -> f64 {
    DEFAULT_PERIOD_S
}

impl ControllerDef {
    pub fn stage_items(&self) -> Vec<String> {
        self.stages.items()
    }

    pub fn ratio_items(&self) -> Vec<String> {
        self.temp_ratio.items()
    }

    /// Validate and convert into controller settings.
    pub fn to_settings(&self) -> Result<ControllerSettings, ConfigFault> {
        let table = RatioTable::build(&self.stage_items(), &self.ratio_items())?;
        let sample = SampleConfig::new(self.period_s)?;
        ControllerSettings::new(StageId::new(&self.heater), table, sample)
    }
}

/// Option value given either as comma-separated text or as a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListDef {
    Items(Vec<ScalarDef>),
    Scalar(ScalarDef),
}

impl ListDef {
    /// Raw item texts; comma-separated text is split like the host does.
    pub fn items(&self) -> Vec<String> {
        match self {
            ListDef::Items(items) => items.iter().map(ScalarDef::to_text).collect(),
            ListDef::Scalar(ScalarDef::Text(text)) => text.split(',').map(str::to_string).collect(),
            ListDef::Scalar(number) => vec![number.to_text()],
        }
    }
}

impl From<&str> for ListDef {
    fn from(text: &str) -> Self {
        ListDef::Scalar(ScalarDef::Text(text.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScalarDef {
    Number(f64),
    Text(String),
}

impl ScalarDef {
    pub fn to_text(&self) -> String {
        match self {
            ScalarDef::Number(n) => n.to_string(),
            ScalarDef::Text(t) => t.clone(),
        }
    }
}

/// Scripted host activity for simulation runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDef {
    pub t_end_s: f64,
    #[serde(default)]
    pub events: Vec<ScenarioEventDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ScenarioEventDef {
    /// Command a new target on a heater (as a user or print job would).
    SetPrimaryTarget {
        at_s: f64,
        heater: String,
        target: f64,
    },
    /// Make a heater reject further commands.
    FailStage { at_s: f64, stage: String },
    /// Clear a previous `FailStage`.
    RestoreStage { at_s: f64, stage: String },
    /// Drop a heater from the registry; outstanding handles dangle.
    RemoveStage { at_s: f64, stage: String },
}

impl ScenarioEventDef {
    pub fn at_s(&self) -> f64 {
        match self {
            ScenarioEventDef::SetPrimaryTarget { at_s, .. }
            | ScenarioEventDef::FailStage { at_s, .. }
            | ScenarioEventDef::RestoreStage { at_s, .. }
            | ScenarioEventDef::RemoveStage { at_s, .. } => *at_s,
        }
    }

    /// Heater the event acts on.
    pub fn heater_id(&self) -> &str {
        match self {
            ScenarioEventDef::SetPrimaryTarget { heater, .. } => heater,
            ScenarioEventDef::FailStage { stage, .. }
            | ScenarioEventDef::RestoreStage { stage, .. }
            | ScenarioEventDef::RemoveStage { stage, .. } => stage,
        }
    }
}
