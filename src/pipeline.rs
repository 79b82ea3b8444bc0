//! One download-create-playback cycle.
//!
//! The pipeline threads its intermediate results through the stages
//! `Fetching → Building → Encoding → Probing → WaitingToPlay → Playing`;
//! the first failing stage aborts the run with its cause, and nothing
//! propagates past the run boundary: the scheduler logs the outcome and
//! moves on. A run-lock serializes runs so the output folder and the
//! playback slot are never shared, even when trigger windows overlap.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::KioskConfig;
use crate::encode::{EncodeError, Encoder, EncodeResult};
use crate::fetch::{FetchError, ImageSource, RemoteImageSource};
use crate::music;
use crate::playback::{PlaybackError, PlaybackWindow, Player};
use crate::probe::{ProbeError, Prober};
use crate::retry::RetryPolicy;
use crate::slideshow;

/// Stage a run was in when it produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    Building,
    Encoding,
    Probing,
    WaitingToPlay,
    Playing,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching images",
            Self::Building => "building the slideshow spec",
            Self::Encoding => "encoding",
            Self::Probing => "probing the artifact",
            Self::WaitingToPlay => "waiting for the playback window",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

/// Error type for a failed run; carries the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image retrieval failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("slide show creation failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("duration probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("playback failed: {0}")]
    Playback(#[from] PlaybackError),

    #[error("run interrupted by shutdown")]
    Canceled,
}

impl PipelineError {
    /// The stage the run failed in.
    pub fn stage(&self) -> RunStage {
        match self {
            Self::Fetch(_) | Self::Canceled => RunStage::Fetching,
            Self::Encode(_) => RunStage::Encoding,
            Self::Probe(_) => RunStage::Probing,
            Self::Playback(PlaybackError::Canceled) => RunStage::WaitingToPlay,
            Self::Playback(_) => RunStage::Playing,
        }
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of images that made it into the slideshow.
    pub image_count: usize,
    /// Encoder output and its duration estimate.
    pub encode: EncodeResult,
    /// Probed duration that drove playback timing.
    pub actual_duration_secs: f64,
    /// The finished playback.
    pub window: PlaybackWindow,
}

/// One run's stage machinery and the shared resources it needs.
pub struct Pipeline {
    source: Arc<dyn ImageSource>,
    images_root: PathBuf,
    music_dir: Option<PathBuf>,
    image_duration: u32,
    transition_duration: u32,
    encoder: Encoder,
    prober: Prober,
    player: Player,
    // The output folder and playback slot are single-occupancy.
    run_lock: Mutex<()>,
}

impl Pipeline {
    /// Assembles a pipeline from explicit components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ImageSource>,
        images_root: impl Into<PathBuf>,
        music_dir: Option<PathBuf>,
        image_duration: u32,
        transition_duration: u32,
        encoder: Encoder,
        prober: Prober,
        player: Player,
    ) -> Self {
        Self {
            source,
            images_root: images_root.into(),
            music_dir,
            image_duration,
            transition_duration,
            encoder,
            prober,
            player,
            run_lock: Mutex::new(()),
        }
    }

    /// Assembles the production pipeline described by `config`.
    pub fn from_config(config: &KioskConfig) -> anyhow::Result<Self> {
        let policy = RetryPolicy {
            max_attempts: config.retry_cap(),
            backoff: crate::retry::Backoff::default(),
        };
        let source = RemoteImageSource::new(&config.images_api)?.with_policy(policy);

        let prober = Prober::new();
        let encoder = Encoder::new(
            &config.created_slide_shows_path,
            &config.slide_show_resolution,
        )
        .with_mp4(config.mp4)
        .with_timeout(std::time::Duration::from_secs(config.encode_timeout_secs))
        .with_prober(prober.clone());

        let player = Player::new(config.player).with_fullscreen(config.fullscreen);

        Ok(Self::new(
            Arc::new(source),
            &config.downloaded_images_path,
            Some(config.background_music_path.clone()),
            config.image_display_duration,
            config.transition_duration,
            encoder,
            prober,
            player,
        ))
    }

    /// Runs one full cycle, timed to end playback at `deadline` when given.
    ///
    /// Failed runs keep their downloaded images (and any partial encoder
    /// output) on disk for inspection.
    pub async fn run(
        &self,
        deadline: Option<DateTime<Local>>,
        shutdown: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let _guard = self.run_lock.lock().await;

        debug!("retrieving images");
        let images = tokio::select! {
            () = shutdown.cancelled() => return Err(PipelineError::Canceled),
            fetched = self.source.fetch(&self.images_root) => fetched?,
        };

        debug!("building slideshow spec for {} images", images.len());
        let spec_text = slideshow::build_spec(
            &images,
            self.image_duration,
            self.transition_duration,
            &mut rand::thread_rng(),
        );

        let audio = self.pick_music();

        let encode = self
            .encoder
            .encode(
                &spec_text,
                images.len(),
                self.image_duration,
                audio.as_deref(),
                shutdown,
            )
            .await?;
        info!("slide show created: {}", encode.artifact_path.display());

        let actual = self.prober.probe(&encode.artifact_path).await?;
        debug!(
            "estimated duration {}s, probed duration {actual}s",
            encode.estimated_duration_secs
        );
        if (actual - encode.estimated_duration_secs as f64).abs() > f64::EPSILON {
            debug!("durations diverge; the probed value drives playback");
        }

        let window = self
            .player
            .play(&encode.artifact_path, actual, deadline, shutdown)
            .await?;

        info!("download-create-playback cycle ended");
        Ok(RunReport {
            image_count: images.len(),
            encode,
            actual_duration_secs: actual,
            window,
        })
    }

    fn pick_music(&self) -> Option<PathBuf> {
        let dir: &Path = self.music_dir.as_deref()?;
        let picked = music::pick_random(dir);
        if picked.is_none() {
            warn!(
                "no background track in {}; slide show will be padded with silence",
                dir.display()
            );
        }
        picked
    }
}
