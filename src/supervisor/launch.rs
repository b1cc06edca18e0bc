use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::BackendSpec;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("spawn failed for backend '{name}' on port {port}: {source}")]
    Spawn {
        name: String,
        port: u16,
        source: io::Error,
    },

    #[error("cannot locate backend binary: {0}")]
    BinaryNotFound(io::Error),
}

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("failed to signal PID {pid}: {source}")]
    Kill { pid: u32, source: nix::Error },
}

/// An owned reference to a live or exited backend process.
pub trait ProcessHandle: Send {
    /// OS process id of the child.
    fn pid(&self) -> u32;

    /// Non-blocking liveness check. A check that errors is reported as
    /// dead so the monitor loop restarts rather than wedges.
    fn is_alive(&mut self) -> bool;

    /// Send SIGTERM. Fire-and-forget: does not wait for the child to exit.
    fn terminate(&self) -> Result<(), SignalError>;
}

/// Starts one backend from its spec and hands back the process handle.
pub trait Launcher: Send + Sync {
    type Handle: ProcessHandle;

    fn launch(&self, spec: &BackendSpec) -> Result<Self::Handle, LaunchError>;
}

/// Handle over a spawned OS child process.
pub struct OsHandle {
    child: Child,
    pid: u32,
    seen_dead: bool,
}

impl OsHandle {
    fn new(child: Child, pid: u32) -> Self {
        Self {
            child,
            pid,
            seen_dead: false,
        }
    }
}

impl ProcessHandle for OsHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.seen_dead {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("Child {} exited with status {:?}", self.pid, status.code());
                self.seen_dead = true;
                false
            }
            Err(e) => {
                warn!("Liveness check failed for PID {}: {}, assuming dead", self.pid, e);
                self.seen_dead = true;
                false
            }
        }
    }

    fn terminate(&self) -> Result<(), SignalError> {
        signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(|source| {
            SignalError::Kill {
                pid: self.pid,
                source,
            }
        })
    }
}

/// Launches backends by re-executing this binary in `backend` mode, the
/// same way the reference scripts spawned an interpreter one-liner.
pub struct CommandLauncher {
    program: PathBuf,
}

impl CommandLauncher {
    pub fn new() -> Result<Self, LaunchError> {
        let program = std::env::current_exe().map_err(LaunchError::BinaryNotFound)?;
        Ok(Self { program })
    }

    /// Use an arbitrary program instead of the current binary. The spec's
    /// port/name/message are still passed as `backend` subcommand arguments.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Launcher for CommandLauncher {
    type Handle = OsHandle;

    fn launch(&self, spec: &BackendSpec) -> Result<OsHandle, LaunchError> {
        let child = Command::new(&self.program)
            .arg("backend")
            .arg("--port")
            .arg(spec.port.to_string())
            .arg("--name")
            .arg(&spec.name)
            .arg("--message")
            .arg(&spec.message)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                name: spec.name.clone(),
                port: spec.port,
                source,
            })?;

        // The child was just spawned, so its id is still present.
        let pid = child.id().unwrap_or_default();
        info!(
            "Started backend {} on port {} (PID: {})",
            spec.name, spec.port, pid
        );
        Ok(OsHandle::new(child, pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep_spec() -> BackendSpec {
        BackendSpec::new(0, "sleeper", "unused")
    }

    /// Launcher that runs `sleep` regardless of the spec, so tests get a
    /// real child process without needing the backend binary.
    struct SleepLauncher {
        seconds: &'static str,
    }

    impl Launcher for SleepLauncher {
        type Handle = OsHandle;

        fn launch(&self, _spec: &BackendSpec) -> Result<OsHandle, LaunchError> {
            let child = Command::new("sleep")
                .arg(self.seconds)
                .stdin(Stdio::null())
                .spawn()
                .map_err(|source| LaunchError::Spawn {
                    name: "sleeper".to_string(),
                    port: 0,
                    source,
                })?;
            let pid = child.id().unwrap_or_default();
            Ok(OsHandle::new(child, pid))
        }
    }

    #[tokio::test]
    async fn test_handle_reports_alive_then_dead() {
        let launcher = SleepLauncher { seconds: "30" };
        let mut handle = launcher.launch(&sleep_spec()).unwrap();
        assert!(handle.pid() > 0);
        assert!(handle.is_alive());

        handle.terminate().unwrap();
        // SIGTERM delivery is asynchronous; poll briefly.
        for _ in 0..50 {
            if !handle.is_alive() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("child did not die after SIGTERM");
    }

    #[tokio::test]
    async fn test_exited_child_stays_dead() {
        let launcher = SleepLauncher { seconds: "0" };
        let mut handle = launcher.launch(&sleep_spec()).unwrap();
        for _ in 0..50 {
            if !handle.is_alive() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!handle.is_alive());
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let launcher = CommandLauncher::with_program("/nonexistent/portminder");
        let result = launcher.launch(&BackendSpec::new(9001, "T1", "hi"));
        assert!(matches!(result, Err(LaunchError::Spawn { port: 9001, .. })));
    }
}
