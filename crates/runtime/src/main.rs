//! Wraith Drowsiness Engine - Main Entry Point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use runtime::{init_logging, load_scenario, run_scenario, HostOutput, Settings};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Replay a recorded drive through the drowsiness engine
#[derive(Parser, Debug)]
#[command(name = "wraith")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON-lines scenario to replay
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Settings file (TOML); defaults apply when omitted
    #[arg(value_name = "SETTINGS")]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref())?;
    init_logging(settings.runtime.json_logs)?;

    info!("=== Wraith Drowsiness Engine v{} ===", env!("CARGO_PKG_VERSION"));
    let events = load_scenario(&cli.scenario)?;

    let (output_tx, mut output_rx) = mpsc::unbounded_channel::<HostOutput>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let printer = tokio::spawn(async move {
        while let Some(output) = output_rx.recv().await {
            match serde_json::to_string(&output) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to encode output: {}", e),
            }
        }
    });

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would read as a shutdown request
                warn!("Ctrl-C handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    let summary = run_scenario(&settings, events, output_tx, shutdown_rx).await?;
    printer.await.context("Output task failed")?;

    info!(
        frames = summary.frames,
        positions = summary.positions,
        positions_dropped = summary.positions_dropped,
        inputs = summary.inputs,
        notifications = summary.notifications,
        drowsy_events = summary.drowsy_events,
        "Scenario complete"
    );
    Ok(())
}
