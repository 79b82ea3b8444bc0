//! `slidekiosk` CLI - scheduled daemon and one-shot cycle runner

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use slidekiosk::pipeline::Pipeline;
use slidekiosk::scheduler::Scheduler;
use slidekiosk::{config, schedule, DEFAULT_CONFIG_PATH, DEFAULT_SCHEDULE_PATH};

#[derive(Parser)]
#[command(name = "slidekiosk")]
#[command(about = "Unattended slideshow kiosk daemon")]
#[command(version)]
struct Cli {
    /// Parameter file path
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Schedule file path
    #[arg(long, default_value = DEFAULT_SCHEDULE_PATH)]
    schedule: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling loop forever (the default)
    Daemon,

    /// Run one download-create-playback cycle immediately, with no deadline
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    let config = config::load(&cli.config)
        .with_context(|| format!("reading configuration from {}", cli.config.display()))?;

    let shutdown = CancellationToken::new();
    let signalled = shutdown.clone();
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            info!("termination signal received");
        }
        signalled.cancel();
    });

    let pipeline = Arc::new(Pipeline::from_config(&config)?);

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Run => match pipeline.run(None, &shutdown).await {
            Ok(report) => {
                info!(
                    "played {} images for {:.1}s",
                    report.image_count, report.window.actual_duration_secs
                );
                Ok(())
            }
            Err(e) => {
                error!("cycle failed while {}: {e}", e.stage());
                anyhow::bail!("cycle failed: {e}");
            }
        },
        Commands::Daemon => {
            let deadlines = schedule::load_schedule(&cli.schedule)
                .with_context(|| format!("reading schedule from {}", cli.schedule.display()))?;

            let mut scheduler = Scheduler::new(pipeline, &deadlines, config.launch_time_offset);
            scheduler.run(&shutdown).await;
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
