//! Slideshow encoding via the external `dvd-slideshow` tool.
//!
//! The supervisor writes the rendered spec to a scratch file, builds the
//! encoder command line, forwards the child's progress lines to the log, and
//! enforces a hard wall-clock timeout. A timed-out encode kills the child
//! and fails the run; whatever partial output file exists is left on disk
//! for inspection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::probe::Prober;
use crate::process::{ProcessError, Supervised};

/// Default hard limit on a single encode.
pub const DEFAULT_ENCODE_TIMEOUT: Duration = Duration::from_secs(900);

const ENCODER_TAG: &str = "dvd-slideshow";

/// Error type for encoding operations.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder exceeded the wall-clock limit and was killed. The
    /// partially written output file, if any, is retained.
    #[error("slide show creation exceeded its {limit:?} limit")]
    Timeout { limit: Duration },

    /// Daemon shutdown interrupted the encode; the child was killed.
    #[error("slide show creation interrupted by shutdown")]
    Canceled,

    /// The encoder exited with a non-zero status.
    #[error("encoder failed with exit code {0}")]
    Failed(i32),

    /// The encoder was terminated by a signal.
    #[error("encoder was terminated by a signal")]
    Terminated,

    /// Spawn or filesystem failure.
    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for EncodeError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { limit } => Self::Timeout { limit },
            ProcessError::Canceled => Self::Canceled,
            ProcessError::Io(e) => Self::Io(e),
        }
    }
}

/// Result of one successful encode.
#[derive(Debug, Clone)]
pub struct EncodeResult {
    /// The produced video file.
    pub artifact_path: PathBuf,
    /// `image_display_duration × image_count`; the probed duration is
    /// authoritative and may diverge.
    pub estimated_duration_secs: u64,
}

/// Supervisor for the external slideshow encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    bin: String,
    output_dir: PathBuf,
    resolution: String,
    mp4: bool,
    timeout: Duration,
    prober: Prober,
}

impl Encoder {
    /// Locate `dvd-slideshow` in `PATH`, falling back to the bare name.
    pub fn new(output_dir: impl Into<PathBuf>, resolution: impl Into<String>) -> Self {
        let bin = which::which(ENCODER_TAG).map_or_else(
            |_| ENCODER_TAG.to_string(),
            |p| p.to_string_lossy().to_string(),
        );
        Self {
            bin,
            output_dir: output_dir.into(),
            resolution: resolution.into(),
            mp4: true,
            timeout: DEFAULT_ENCODE_TIMEOUT,
            prober: Prober::new(),
        }
    }

    /// Use a specific encoder binary.
    #[must_use]
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Emit MP4 instead of the encoder's default container.
    #[must_use]
    pub fn with_mp4(mut self, mp4: bool) -> Self {
        self.mp4 = mp4;
        self
    }

    /// Replace the hard encode timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Prober used for background-audio durations.
    #[must_use]
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    fn artifact_extension(&self) -> &'static str {
        if self.mp4 {
            "mp4"
        } else {
            "vob"
        }
    }

    fn build_args(&self, name: &str, spec_file: &Path, audio: &[&Path]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-n".into(),
            name.into(),
            "-f".into(),
            spec_file.as_os_str().to_os_string(),
            "-o".into(),
            self.output_dir.as_os_str().to_os_string(),
            "-s".into(),
            self.resolution.clone().into(),
        ];

        for track in audio {
            args.push("-a".into());
            args.push(track.as_os_str().to_os_string());
        }

        if self.mp4 {
            args.push("-mp4".into());
        }

        args
    }

    /// Encodes one slideshow from the rendered `spec_text`.
    ///
    /// `audio`, when present and shorter than the estimated video length, is
    /// repeated enough times for the encoder's concatenation to cover the
    /// whole video.
    pub async fn encode(
        &self,
        spec_text: &str,
        image_count: usize,
        image_duration: u32,
        audio: Option<&Path>,
        shutdown: &CancellationToken,
    ) -> Result<EncodeResult, EncodeError> {
        let estimated = u64::from(image_duration) * image_count as u64;

        let name = Uuid::new_v4().to_string();
        let artifact_path = self
            .output_dir
            .join(format!("{name}.{}", self.artifact_extension()));

        let spec_file = std::env::temp_dir().join(format!("{name}.slideshow"));
        tokio::fs::write(&spec_file, spec_text).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let repeats = match audio {
            Some(track) => match self.prober.probe(track).await {
                Ok(track_secs) => audio_repeats(estimated, track_secs),
                Err(e) => {
                    warn!(
                        "cannot probe background track {}: {e}; encoding without audio",
                        track.display()
                    );
                    0
                }
            },
            None => 0,
        };
        let audio_args: Vec<&Path> = audio
            .into_iter()
            .flat_map(|track| std::iter::repeat(track).take(repeats))
            .collect();

        let args = self.build_args(&name, &spec_file, &audio_args);
        debug!("starting encode of {image_count} images, estimated {estimated}s");

        let mut child = Supervised::spawn(&self.bin, &args, ENCODER_TAG)?;
        child.forward_lines();

        let status = child.wait_timeout(Some(self.timeout), shutdown).await?;
        if !status.success() {
            return match status.code() {
                Some(code) => Err(EncodeError::Failed(code)),
                None => Err(EncodeError::Terminated),
            };
        }

        Ok(EncodeResult {
            artifact_path,
            estimated_duration_secs: estimated,
        })
    }
}

/// Number of `-a` repetitions needed for `track_secs` of audio to cover
/// `estimated_secs` of video.
fn audio_repeats(estimated_secs: u64, track_secs: f64) -> usize {
    if track_secs <= 0.0 {
        return 1;
    }
    let repeats = (estimated_secs as f64 / track_secs).ceil();
    (repeats as usize).max(1)
}
