//! Standalone sample image server for exercising the kiosk without the real
//! image backend.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slidekiosk::mock_images;

#[derive(Parser)]
#[command(name = "slidekiosk-imageserver")]
#[command(about = "Serve sample images over the kiosk's playlist protocol")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    listen: String,

    /// Folder holding the sample images (png/jpg/jpeg/gif)
    #[arg(long)]
    samples: PathBuf,

    /// Smallest playlist size
    #[arg(long, default_value = "3")]
    min_images: usize,

    /// Largest playlist size
    #[arg(long, default_value = "15")]
    max_images: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;

    mock_images::serve(listener, cli.samples, cli.min_images, cli.max_images)
        .await
        .context("serving sample images")?;

    Ok(())
}
