//! Error types for simulated host operations.

use thiserror::Error;

/// Errors encountered while setting up or running the simulated host.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<ss_project::ProjectError> for SimError {
    fn from(e: ss_project::ProjectError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<ss_core::CoreError> for SimError {
    fn from(e: ss_core::CoreError) -> Self {
        match e {
            ss_core::CoreError::NonFinite { what, .. } | ss_core::CoreError::InvalidArg { what } => {
                SimError::InvalidArg { what }
            }
        }
    }
}
