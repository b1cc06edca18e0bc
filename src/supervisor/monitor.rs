use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::launch::{LaunchError, Launcher, ProcessHandle};
use super::restart::{RestartPolicy, RestartTracker};
use crate::config::{BackendSpec, SupervisorConfig};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("backend '{name}' on port {port} failed {attempts} consecutive restarts, giving up")]
    RestartExhausted {
        name: String,
        port: u16,
        attempts: u32,
    },

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

struct Entry<H> {
    spec: BackendSpec,
    handle: H,
    tracker: RestartTracker,
}

/// Owns the port -> process table and keeps every declared backend running.
///
/// All mutation happens on the monitor loop (or on the caller's task before
/// and after it), so the table needs no locking: exactly one live handle per
/// declared port, swapped in place on restart.
pub struct Supervisor<L: Launcher> {
    launcher: L,
    config: SupervisorConfig,
    policy: RestartPolicy,
    entries: HashMap<u16, Entry<L::Handle>>,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(launcher: L, config: SupervisorConfig) -> Self {
        Self {
            launcher,
            config,
            policy: RestartPolicy::default(),
            entries: HashMap::new(),
        }
    }

    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Launch every declared backend. Fails fast on the first launch error
    /// and rolls back the children already started, so a partial pool is
    /// never left behind.
    pub fn start_all(&mut self, specs: &[BackendSpec]) -> Result<(), SupervisorError> {
        for spec in specs {
            match self.launcher.launch(spec) {
                Ok(handle) => {
                    self.entries.insert(
                        spec.port,
                        Entry {
                            spec: spec.clone(),
                            handle,
                            tracker: RestartTracker::new(),
                        },
                    );
                }
                Err(e) => {
                    error!(
                        "Failed to start backend {} on port {}: {}",
                        spec.name, spec.port, e
                    );
                    self.stop_all();
                    self.entries.clear();
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// One monitor pass: restart crashed backends, honoring the backoff
    /// schedule. Errors only when a backend exhausts its restart budget.
    pub fn tick(&mut self) -> Result<(), SupervisorError> {
        let now = Instant::now();
        for entry in self.entries.values_mut() {
            if entry.handle.is_alive() {
                entry.tracker.note_healthy();
                continue;
            }

            if !entry.tracker.pending() {
                warn!(
                    "Backend {} on port {} crashed. Restarting...",
                    entry.spec.name, entry.spec.port
                );
                let failures = entry.tracker.note_failure(&self.policy, now);
                Self::check_budget(&self.policy, &entry.spec, failures)?;
            }

            if entry.tracker.ready(now) {
                match self.launcher.launch(&entry.spec) {
                    Ok(handle) => {
                        entry.handle = handle;
                        entry.tracker.note_relaunched();
                    }
                    Err(e) => {
                        warn!(
                            "Relaunch of backend {} on port {} failed: {}",
                            entry.spec.name, entry.spec.port, e
                        );
                        let failures = entry.tracker.note_failure(&self.policy, now);
                        Self::check_budget(&self.policy, &entry.spec, failures)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_budget(
        policy: &RestartPolicy,
        spec: &BackendSpec,
        failures: u32,
    ) -> Result<(), SupervisorError> {
        if failures >= policy.max_consecutive_failures {
            Err(SupervisorError::RestartExhausted {
                name: spec.name.clone(),
                port: spec.port,
                attempts: failures,
            })
        } else {
            Ok(())
        }
    }

    /// Poll liveness until cancelled. Runs the first check one full
    /// interval after startup.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Monitor loop cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.tick()?;
                }
            }
        }
    }

    /// SIGTERM every backend still alive. Fire-and-forget: no wait for
    /// exit, dead handles are skipped.
    pub fn stop_all(&mut self) {
        for entry in self.entries.values_mut() {
            if !entry.handle.is_alive() {
                continue;
            }
            info!(
                "Stopping backend on port {} (PID: {})...",
                entry.spec.port,
                entry.handle.pid()
            );
            if let Err(e) = entry.handle.terminate() {
                warn!(
                    "Failed to stop backend on port {}: {}",
                    entry.spec.port, e
                );
            }
        }
    }

    /// Ports currently under supervision.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.entries.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn pid_of(&self, port: u16) -> Option<u32> {
        self.entries.get(&port).map(|e| e.handle.pid())
    }
}
