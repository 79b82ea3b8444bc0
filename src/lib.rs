//! `slidekiosk` - unattended slideshow kiosk daemon
//!
//! # What it does
//!
//! - **Scheduling**: daily deadlines from a plain-text schedule, dispatched
//!   `launch_time_offset` minutes early on a coarse polling loop
//! - **Fetching**: playlist → resolver → binary image downloads with a
//!   configurable retry policy
//! - **Encoding**: supervised external `dvd-slideshow` runs with a hard
//!   timeout and forwarded progress lines
//! - **Playback**: `mpv`/`cvlc` timed so playback ends exactly at the
//!   configured deadline
//!
//! # Example
//!
//! ```rust,no_run
//! use slidekiosk::{config::KioskConfig, pipeline::Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::from_config(&KioskConfig::default())?;
//!     let report = pipeline.run(None, &CancellationToken::new()).await?;
//!     println!("played {}", report.window.artifact_path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod encode;
pub mod fetch;
pub mod mock_images;
pub mod music;
pub mod pipeline;
pub mod playback;
pub mod probe;
pub mod process;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod slideshow;

pub use config::{KioskConfig, DEFAULT_CONFIG_PATH, DEFAULT_SCHEDULE_PATH};
pub use encode::{EncodeError, EncodeResult, Encoder};
pub use fetch::{FetchError, ImageSource, RemoteImageSource};
pub use pipeline::{Pipeline, PipelineError, RunReport, RunStage};
pub use playback::{PlaybackError, PlaybackWindow, Player, PlayerKind};
pub use probe::{ProbeError, Prober};
pub use retry::{Backoff, RetryPolicy};
pub use schedule::Job;
pub use scheduler::Scheduler;
pub use slideshow::{SlideshowEntry, TransitionKind, WipeDirection};

/// Version of slidekiosk
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
