use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Project(#[from] ss_project::ProjectError),

    #[error("Simulation error: {0}")]
    Sim(#[from] ss_sim::SimError),

    #[error("Host shut down: {message}")]
    Shutdown { message: String },
}

pub type CliResult<T> = Result<T, CliError>;
