//! # Ingestion CLI
//!
//! Drives the ingestion workflow against the local filesystem backend.
//! Useful for exercising a directory layout before it is ingested for real.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use raster_ingestion::logging::init_structured_logging;
use raster_ingestion::state_machine::OrchestratorSnapshot;
use raster_ingestion::{
    ConfigManager, IngestionConfig, IngestionOrchestrator, LocalIngestionServices,
    OrchestratorEvent, OrchestratorHandle, RootState,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "ingestion-cli")]
#[command(about = "Run raster ingestion workflows against a local directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: ./config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment whose overrides are applied (default: INGESTION_ENV)
    #[arg(short, long)]
    environment: Option<String>,

    /// Root directory of the local backend, overriding `local.root`
    #[arg(short, long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute a script of events, one JSON event per line
    Run {
        /// Script file; blank lines and lines starting with `#` are skipped
        script: PathBuf,
        /// How long the workflow must stay quiet before the next event
        #[arg(long, default_value = "100")]
        settle_ms: u64,
        /// Give up on an event after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },
    /// List a directory below the backend root
    Browse {
        #[arg(default_value = "/")]
        directory: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Run {
            script,
            settle_ms,
            timeout_secs,
        } => {
            run_script(
                config,
                script,
                Duration::from_millis(settle_ms),
                Duration::from_secs(timeout_secs),
            )
            .await
        }
        Commands::Browse { directory } => browse(config, &directory).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<IngestionConfig> {
    let manager = match &cli.environment {
        Some(environment) => {
            ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment)
        }
        None => ConfigManager::load_from_directory(cli.config_dir.clone()),
    }
    .context("failed to load configuration")?;

    let mut config = manager.config().clone();
    if let Some(root) = &cli.root {
        config.local.root = root.clone();
    }
    Ok(config)
}

fn spawn_orchestrator(config: IngestionConfig) -> OrchestratorHandle {
    let services = Arc::new(LocalIngestionServices::from_config(&config.local));
    IngestionOrchestrator::new(services, config).spawn()
}

async fn run_script(
    config: IngestionConfig,
    script: PathBuf,
    settle: Duration,
    timeout: Duration,
) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(&script)
        .await
        .with_context(|| format!("failed to read script {}", script.display()))?;

    let mut events = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: OrchestratorEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid event", script.display(), index + 1))?;
        events.push(event);
    }
    info!(script = %script.display(), events = events.len(), "Running ingestion script");

    let handle = spawn_orchestrator(config);
    let mut transitions = handle.subscribe_transitions();
    let printer = tokio::spawn(async move {
        loop {
            match transitions.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => debug!(error = %e, "Failed to serialize transition"),
                },
                Err(RecvError::Lagged(missed)) => debug!(missed, "Transition printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    for event in events {
        if handle.state() == RootState::Done {
            bail!("workflow finished before `{}` could be sent", event.event_type());
        }
        debug!(event = event.event_type(), "Dispatching scripted event");
        let mut snapshots = handle.watch();
        snapshots.mark_unchanged();
        handle.send(event).await?;
        wait_until_settled(&mut snapshots, settle, timeout).await?;
    }

    let snapshot = handle.snapshot();
    handle.shutdown().await?;
    // Lets the printer drain and observe the closed channel
    let _ = printer.await;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if snapshot.context.has_errors() {
        bail!("workflow ended with {} error(s)", snapshot.context.errors.len());
    }
    Ok(())
}

/// Nothing is in flight and only a user event can move the workflow on
fn is_settled(snapshot: &OrchestratorSnapshot) -> bool {
    match snapshot.state {
        RootState::Done => true,
        RootState::JobPolling | RootState::JobPollingWait => false,
        RootState::FileSelection => snapshot.child_state.is_some_and(|c| c.is_idle()),
        _ => !snapshot.is_loading(),
    }
}

async fn wait_until_settled(
    snapshots: &mut tokio::sync::watch::Receiver<OrchestratorSnapshot>,
    settle: Duration,
    timeout: Duration,
) -> anyhow::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            bail!("workflow did not settle within {timeout:?}");
        }
        match tokio::time::timeout(settle, snapshots.changed()).await {
            Ok(Ok(())) => continue,
            // The orchestrator stopped after reaching a terminal state
            Ok(Err(_)) => return Ok(()),
            Err(_) if is_settled(&snapshots.borrow()) => return Ok(()),
            Err(_) => continue,
        }
    }
}

async fn browse(config: IngestionConfig, directory: &str) -> anyhow::Result<()> {
    let handle = spawn_orchestrator(config);
    let entries = handle.browse(directory).await?;
    for entry in &entries {
        let kind = if entry.is_directory { "📁" } else { "📄" };
        match entry.size {
            Some(size) => println!("{kind} {} ({size} bytes)", entry.name),
            None => println!("{kind} {}", entry.name),
        }
    }
    handle.shutdown().await?;
    Ok(())
}
