//! One-shot port reaper.
//!
//! Discovers whatever currently owns the known backend ports and sends it
//! SIGTERM. Deliberately independent of the supervisor: it works from
//! kernel-visible port bindings, so it cleans up orphans even after the
//! supervising process is gone.

use std::process::Command;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{info, warn};

use crate::supervisor::SignalError;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("port owner utility failed to run: {0}")]
    Utility(#[from] std::io::Error),

    #[error("unexpected output from port owner utility: {0:?}")]
    UnexpectedOutput(String),
}

/// Resolves a TCP port to the process ids currently bound to it.
pub trait PortOwnerLookup {
    fn owners(&self, port: u16) -> Result<Vec<i32>, LookupError>;
}

/// Delivers a termination signal to one process.
pub trait SignalSender {
    fn send_term(&self, pid: i32) -> Result<(), SignalError>;
}

/// Production lookup, shelling out to `lsof -ti :PORT`.
pub struct LsofLookup;

impl PortOwnerLookup for LsofLookup {
    fn owners(&self, port: u16) -> Result<Vec<i32>, LookupError> {
        let output = Command::new("lsof")
            .args(["-ti", &format!(":{}", port)])
            .output()?;

        // lsof exits non-zero when nothing matches; empty output is the
        // real signal for "no owner".
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut pids = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let pid = line
                .parse::<i32>()
                .map_err(|_| LookupError::UnexpectedOutput(line.to_string()))?;
            pids.push(pid);
        }
        Ok(pids)
    }
}

/// Production signaller, SIGTERM via the OS.
pub struct TermSignaller;

impl SignalSender for TermSignaller {
    fn send_term(&self, pid: i32) -> Result<(), SignalError> {
        signal::kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|source| SignalError::Kill {
            pid: pid as u32,
            source,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PortOutcome {
    NothingToStop,
    Signalled { stopped: Vec<i32>, failed: Vec<i32> },
    LookupFailed(String),
}

#[derive(Debug)]
pub struct PortReport {
    pub port: u16,
    pub outcome: PortOutcome,
}

pub struct Reaper<L, S> {
    lookup: L,
    signaller: S,
}

impl Reaper<LsofLookup, TermSignaller> {
    /// Reaper backed by the real OS collaborators.
    pub fn system() -> Self {
        Self::new(LsofLookup, TermSignaller)
    }
}

impl<L: PortOwnerLookup, S: SignalSender> Reaper<L, S> {
    pub fn new(lookup: L, signaller: S) -> Self {
        Self { lookup, signaller }
    }

    /// Signal every owner of every given port. Failures are reported per
    /// port and per pid; no failure aborts the rest of the batch.
    pub fn stop_by_ports(&self, ports: &[u16]) -> Vec<PortReport> {
        ports
            .iter()
            .map(|&port| PortReport {
                port,
                outcome: self.stop_port(port),
            })
            .collect()
    }

    fn stop_port(&self, port: u16) -> PortOutcome {
        let pids = match self.lookup.owners(port) {
            Ok(pids) => pids,
            Err(e) => {
                warn!("Error stopping backend on port {}: {}", port, e);
                return PortOutcome::LookupFailed(e.to_string());
            }
        };

        if pids.is_empty() {
            info!("No backend running on port {}.", port);
            return PortOutcome::NothingToStop;
        }

        let mut stopped = Vec::new();
        let mut failed = Vec::new();
        for pid in pids {
            info!("Stopping backend running on port {} (PID: {})...", port, pid);
            match self.signaller.send_term(pid) {
                Ok(()) => stopped.push(pid),
                Err(e) => {
                    warn!("Failed to signal PID {} on port {}: {}", pid, port, e);
                    failed.push(pid);
                }
            }
        }
        PortOutcome::Signalled { stopped, failed }
    }
}
