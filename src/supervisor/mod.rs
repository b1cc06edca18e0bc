pub mod launch;
pub mod monitor;
pub mod restart;

pub use launch::{CommandLauncher, LaunchError, Launcher, OsHandle, ProcessHandle, SignalError};
pub use monitor::{Supervisor, SupervisorError};
pub use restart::{RestartPolicy, RestartTracker};
