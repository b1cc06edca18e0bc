//! Portminder entry point
//!
//! Three modes, one binary:
//! - `start`: launch the backend pool and supervise it until Ctrl-C
//! - `stop`: one-shot reap of whatever owns the known ports
//! - `backend`: run a single dummy backend (what `start` spawns)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use portminder::{backend, config, BackendSpec, CommandLauncher, Reaper, Supervisor, SupervisorConfig};

#[derive(Parser)]
#[command(name = "portminder", version, about = "Supervises a pool of dummy HTTP backends and reaps stragglers by port")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all backends and monitor them until interrupted
    Start {
        /// JSON file with backend specs (defaults to the built-in pool)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seconds between liveness checks
        #[arg(long, default_value = "5")]
        interval_secs: u64,
    },

    /// Stop whatever currently owns the backend ports
    Stop {
        /// JSON file with backend specs (defaults to the built-in pool)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Explicit ports to reap, comma separated (overrides the config)
        #[arg(long, value_delimiter = ',')]
        ports: Vec<u16>,
    },

    /// Run one dummy backend in the foreground (spawned by `start`)
    Backend {
        #[arg(long)]
        port: u16,

        #[arg(long)]
        name: String,

        #[arg(long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Start {
            config,
            interval_secs,
        } => run_supervisor(config, interval_secs).await,
        Commands::Stop { config, ports } => run_reaper(config, ports),
        Commands::Backend {
            port,
            name,
            message,
        } => {
            let spec = BackendSpec::new(port, name, message);
            backend::serve(spec).await?;
            Ok(())
        }
    }
}

fn load_specs(path: Option<PathBuf>) -> Result<Vec<BackendSpec>> {
    match path {
        Some(path) => Ok(config::load_backends(&path)?),
        None => Ok(config::default_backends()),
    }
}

async fn run_supervisor(config: Option<PathBuf>, interval_secs: u64) -> Result<()> {
    let specs = load_specs(config)?;
    let launcher = CommandLauncher::new()?;
    let supervisor_config =
        SupervisorConfig::default().with_poll_interval(Duration::from_secs(interval_secs));
    let mut supervisor = Supervisor::new(launcher, supervisor_config);

    supervisor.start_all(&specs)?;
    info!("✅ All backends are running. Monitoring for crashes...");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⏹️  Stopping all backends...");
            interrupt.cancel();
        }
    });

    let outcome = supervisor.run(cancel).await;
    supervisor.stop_all();

    match outcome {
        Ok(()) => {
            info!("✅ All backends have been stopped!");
            Ok(())
        }
        Err(e) => {
            error!("Supervisor gave up: {}", e);
            Err(e.into())
        }
    }
}

fn run_reaper(config: Option<PathBuf>, ports: Vec<u16>) -> Result<()> {
    let ports = if ports.is_empty() {
        load_specs(config)?.iter().map(|s| s.port).collect()
    } else {
        ports
    };

    // Per-port outcomes are logged by the reaper; the exit code stays 0
    // no matter what was (or was not) found on each port.
    let reaper = Reaper::system();
    reaper.stop_by_ports(&ports);
    info!("✅ All backends have been stopped!");
    Ok(())
}
