//! Backend pool configuration
//!
//! Specs can be loaded from a JSON file or fall back to the compiled-in
//! defaults (three backends on ports 8081-8083).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One supervised backend: where it listens and what it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    pub port: u16,
    pub name: String,
    pub message: String,
}

impl BackendSpec {
    pub fn new(port: u16, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            port,
            name: name.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay between liveness checks.
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl SupervisorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// The backend pool the reference deployment runs.
pub fn default_backends() -> Vec<BackendSpec> {
    vec![
        BackendSpec::new(8081, "B1", "Hello from B1"),
        BackendSpec::new(8082, "B2", "Hello from B2"),
        BackendSpec::new(8083, "B3", "Hello from B3"),
    ]
}

/// Load backend specs from a JSON file: `[{"port": 8081, "name": "B1", ...}]`.
pub fn load_backends(path: &Path) -> Result<Vec<BackendSpec>> {
    let raw = std::fs::read_to_string(path)?;
    let specs: Vec<BackendSpec> = serde_json::from_str(&raw)?;
    Ok(specs)
}
