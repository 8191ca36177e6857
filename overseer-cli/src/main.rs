//! Overseer CLI - run and inspect a supervised set of units

mod console;
mod controllers;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use overseer_core::config::OverseerConfig;
use overseer_supervisor::{Supervisor, UnitSpec, read_status_file, wait_for_shutdown_signal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "overseer")]
#[command(about = "Supervise long-running processes and in-process engines", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: overseer.toml layered with $OVERSEER_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all units and supervise them until a shutdown signal or `quit`
    Run {
        /// Do not read operator commands from stdin
        #[arg(long)]
        no_console: bool,
    },
    /// Print startup and shutdown order
    Plan,
    /// Check the configuration
    Validate,
    /// Print the last status written by a running supervisor
    Status {
        /// Status file (default: supervisor.status_file from the configuration)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<OverseerConfig> {
    let config = match path {
        Some(path) => OverseerConfig::from_file(path)?,
        None => OverseerConfig::load()?,
    };
    Ok(config)
}

async fn run(config: OverseerConfig, console: bool) -> Result<()> {
    let supervisor = Arc::new(Supervisor::from_config(&config, &controllers::catalog())?);

    let report = supervisor.start_all().await;
    if !report.is_clean() {
        warn!(failed = ?report.failed, "some units failed to start");
    }

    let monitor = supervisor.spawn_health_monitor();
    let reporter = supervisor.spawn_status_reporter();

    let quit_requested = async {
        if console {
            match console::run(&supervisor).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "console failed, waiting for a signal"),
            }
        }
        std::future::pending::<()>().await
    };

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signals");
            }
        }
        _ = quit_requested => info!("quit requested from console"),
    }

    let report = supervisor.shutdown().await;
    for task in [monitor, reporter] {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    if let Err(e) = supervisor.report_status().await {
        warn!(error = %e, "failed to write final status");
    }
    info!(stopped = report.stopped.len(), failed = report.failed.len(), "overseer exited");
    Ok(())
}

fn plan(config: &OverseerConfig) {
    println!("Startup order:");
    for unit in config.startup_order() {
        let delay = if unit.startup_delay.is_zero() {
            String::new()
        } else {
            format!(" then wait {:?}", unit.startup_delay)
        };
        let enabled = if unit.enabled { "" } else { " (not enabled)" };
        println!(
            "  {:>4}  {:<24} {}{}{}",
            unit.priority,
            unit.id,
            unit.launch.kind(),
            delay,
            enabled
        );
    }

    println!();
    println!("Shutdown order:");
    for unit in config.shutdown_order() {
        println!("  {:>4}  {}", unit.priority, unit.id);
    }
}

fn validate(config: &OverseerConfig) -> Result<()> {
    let catalog = controllers::catalog();
    for unit in &config.units {
        UnitSpec::from_config(unit, &catalog)
            .with_context(|| format!("unit {} is invalid", unit.id))?;
    }
    println!("Configuration OK: {} units", config.units.len());
    Ok(())
}

async fn status(config: Option<&PathBuf>, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => match load_config(config)?.supervisor.status_file {
            Some(path) => path,
            None => bail!("no status file configured, pass --file"),
        },
    };

    let status = read_status_file(&path)
        .await
        .with_context(|| format!("failed to read status file {}", path.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { no_console } => run(load_config(cli.config.as_ref())?, !no_console).await?,
        Commands::Plan => plan(&load_config(cli.config.as_ref())?),
        Commands::Validate => validate(&load_config(cli.config.as_ref())?)?,
        Commands::Status { file, json } => status(cli.config.as_ref(), file, json).await?,
        Commands::Version => {
            println!("overseer {}", env!("CARGO_PKG_VERSION"));
            println!("overseer-core {}", overseer_core::VERSION);
        }
    }

    Ok(())
}
