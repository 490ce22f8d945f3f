//! Fault taxonomy for stage synchronization.
//!
//! Configuration and resolution faults are fatal and end up at the host's
//! shutdown sink. Propagation and transient read faults are reported and
//! never leave the tick that produced them.

use ss_core::{Real, StageId};
use thiserror::Error;

/// Result type for controller lifecycle operations.
pub type SyncResult<T> = Result<T, Fatal>;

/// Invalid controller configuration, raised at load time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigFault {
    /// Ratio text does not parse as a number.
    #[error("temp_ratio for stage '{stage_id}' is not a number: '{raw}'")]
    MalformedRatio { stage_id: StageId, raw: String },

    /// Ratio parsed but lies outside the allowed range (NaN included).
    #[error("temp_ratio for stage '{stage_id}' is out of bounds: {ratio}")]
    RatioOutOfBounds { stage_id: StageId, ratio: Real },

    /// Stage and ratio lists have different lengths.
    #[error("{stages} stages configured but {ratios} temp_ratio values given")]
    ArityMismatch { stages: usize, ratios: usize },

    #[error("no stages configured")]
    NoStages,

    #[error("empty stage name at position {index}")]
    EmptyStageId { index: usize },

    #[error("stage '{stage_id}' is listed more than once")]
    DuplicateStage { stage_id: StageId },

    /// The primary would end up commanding itself.
    #[error("heater '{stage_id}' cannot be a stage of its own synchronization")]
    PrimaryAsStage { stage_id: StageId },

    #[error("invalid sync period: {period}")]
    InvalidPeriod { period: Real },
}

/// Host objects missing at connect time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionFault {
    #[error("heater '{stage_id}' not found")]
    PrimaryNotFound { stage_id: StageId },

    #[error("stage '{stage_id}' not found")]
    StageNotFound { stage_id: StageId },
}

/// Errors surfaced by the actuator collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActuatorError {
    /// The host refused the command (heater shut down, out of range, ...).
    #[error("command rejected: {message}")]
    Rejected { message: String },

    /// The handle no longer points at a live heater.
    #[error("stage '{stage_id}' is no longer available")]
    Unavailable { stage_id: StageId },

    /// The host could not interpret the command text.
    #[error("malformed command: {script}")]
    Malformed { script: String },
}

/// A failed read of the primary temperature source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("temperature read failed: {message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One secondary stage failed to accept its target during a tick.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("temperature synchronization failed for stage '{stage_id}' (target {target}): {source}")]
pub struct PropagationFault {
    pub stage_id: StageId,
    pub target: Real,
    #[source]
    pub source: ActuatorError,
}

/// The primary could not provide a usable target this tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransientReadFault {
    #[error(transparent)]
    ReadFailed(#[from] SourceError),

    /// Primary reports no target yet.
    #[error("primary has no target temperature")]
    NoTarget,

    /// Target is zero, negative or not finite.
    #[error("invalid primary target temperature: {target}")]
    InvalidTarget { target: Real },
}

/// Faults that end the controller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Fatal {
    #[error(transparent)]
    Config(#[from] ConfigFault),

    #[error(transparent)]
    Resolution(#[from] ResolutionFault),

    #[error("controller for heater '{stage_id}' is already active")]
    AlreadyActive { stage_id: StageId },

    #[error("controller for heater '{stage_id}' was never connected")]
    NotActive { stage_id: StageId },
}
