use thiserror::Error;

use crate::reaper::LookupError;
use crate::supervisor::{LaunchError, SupervisorError};

#[derive(Error, Debug)]
pub enum PortminderError {
    #[error("launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("port lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PortminderError>;
