//! Portminder - supervised backend pool with port reaping
//!
//! This library provides the pieces behind the `portminder` binary:
//!
//! - **Supervisor**: launches a declared pool of backends, polls liveness
//!   on an interval, and relaunches crashed ones with bounded backoff
//! - **Port Reaper**: one-shot cleanup that SIGTERMs whatever currently
//!   owns the known backend ports, independent of supervisor state
//! - **Backend**: the minimal HTTP health/echo server the pool runs

pub mod backend;
pub mod config;
pub mod error;
pub mod reaper;
pub mod supervisor;

// Re-export commonly used types
pub use config::{default_backends, BackendSpec, SupervisorConfig};
pub use error::{PortminderError, Result};
pub use reaper::{PortOwnerLookup, Reaper, SignalSender};
pub use supervisor::{CommandLauncher, Launcher, ProcessHandle, RestartPolicy, Supervisor};
