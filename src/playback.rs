//! Deadline-timed playback of an encoded slideshow.
//!
//! The supervisor spin-waits on a coarse tick until the wall clock reaches
//! `deadline − duration`, then spawns the external player and actively
//! bounds its lifetime: the wait on the child never exceeds the playback
//! duration, and an expired wait kills the player rather than trusting its
//! own timing. Finishing off the deadline by more than a second is logged as
//! a warning, never raised as an error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::process::{ProcessError, Supervised};

/// Error type for playback supervision.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Daemon shutdown interrupted the wait loop or the player.
    #[error("playback interrupted by shutdown")]
    Canceled,

    /// The player could not be spawned or waited on.
    #[error("player I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for PlaybackError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Canceled => PlaybackError::Canceled,
            ProcessError::Io(e) => PlaybackError::Io(e),
            ProcessError::Timeout { limit } => {
                PlaybackError::Io(std::io::Error::other(format!(
                    "child process exceeded its {limit:?} time limit"
                )))
            }
        }
    }
}

/// The two interchangeable player backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Mpv,
    Vlc,
}

impl PlayerKind {
    pub fn bin_name(self) -> &'static str {
        match self {
            Self::Mpv => "mpv",
            Self::Vlc => "cvlc",
        }
    }

    fn launch_args(self, fullscreen: bool) -> Vec<&'static str> {
        match self {
            Self::Mpv => {
                if fullscreen {
                    vec!["-fs"]
                } else {
                    vec![]
                }
            }
            Self::Vlc => {
                let mut args = vec!["--no-video-title-show"];
                if fullscreen {
                    args.push("-f");
                }
                args
            }
        }
    }
}

/// One finished (or truncated) playback.
#[derive(Debug, Clone)]
pub struct PlaybackWindow {
    /// The played video file.
    pub artifact_path: PathBuf,
    /// Probed duration that drove the timing, possibly truncated to fit the
    /// deadline.
    pub actual_duration_secs: f64,
    /// Wall-clock point playback was required to end at, if any.
    pub deadline: Option<DateTime<Local>>,
}

/// Supervisor for the external media player.
#[derive(Debug, Clone)]
pub struct Player {
    kind: PlayerKind,
    bin: String,
    fullscreen: bool,
    tick: Duration,
}

impl Player {
    /// Locate the backend's binary in `PATH`, falling back to the bare name.
    pub fn new(kind: PlayerKind) -> Self {
        let bin = which::which(kind.bin_name()).map_or_else(
            |_| kind.bin_name().to_string(),
            |p| p.to_string_lossy().to_string(),
        );
        Self {
            kind,
            bin,
            fullscreen: true,
            tick: Duration::from_secs(1),
        }
    }

    /// Use a specific player binary.
    #[must_use]
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Toggle fullscreen playback.
    #[must_use]
    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    /// Replace the spin-wait tick interval (capped at one second).
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.min(Duration::from_secs(1));
        self
    }

    /// Plays `artifact` for `duration_secs`, timed to finish at `deadline`.
    ///
    /// Without a deadline, playback starts immediately. With one, the start
    /// is delayed until `deadline − duration` and the duration is truncated
    /// when the artifact no longer fits the remaining window.
    pub async fn play(
        &self,
        artifact: &Path,
        duration_secs: f64,
        deadline: Option<DateTime<Local>>,
        shutdown: &CancellationToken,
    ) -> Result<PlaybackWindow, PlaybackError> {
        let mut duration = duration_secs;

        if let Some(deadline) = deadline {
            let now = Local::now();
            let effective = effective_duration(now, deadline, duration);
            if effective < duration {
                warn!(
                    "slide show is too long to finish by {deadline} and will be \
                     stopped early; the schedule is too dense"
                );
                duration = effective;
            }

            debug!("playback should end at {deadline}");
            self.wait_for_start(deadline, duration, shutdown).await?;
        }

        info!("starting playback of {}", artifact.display());
        let status = self.run_player(artifact, duration, shutdown).await;

        if let Some(deadline) = deadline {
            let now = Local::now();
            if !ended_on_time(now, deadline) {
                warn!("playback did not end at the scheduled time (ended {now})");
            }
            debug!("playback ended at {now}");
        }

        status?;

        Ok(PlaybackWindow {
            artifact_path: artifact.to_path_buf(),
            actual_duration_secs: duration,
            deadline,
        })
    }

    /// Coarse wait until `now ≥ deadline − duration`.
    async fn wait_for_start(
        &self,
        deadline: DateTime<Local>,
        duration_secs: f64,
        shutdown: &CancellationToken,
    ) -> Result<(), PlaybackError> {
        let start_at = deadline - chrono::Duration::milliseconds((duration_secs * 1000.0) as i64);

        loop {
            let now = Local::now();
            if now >= start_at {
                return Ok(());
            }

            tokio::select! {
                () = shutdown.cancelled() => return Err(PlaybackError::Canceled),
                () = tokio::time::sleep(self.tick) => {}
            }
        }
    }

    async fn run_player(
        &self,
        artifact: &Path,
        duration_secs: f64,
        shutdown: &CancellationToken,
    ) -> Result<(), PlaybackError> {
        let mut args: Vec<OsString> = self
            .kind
            .launch_args(self.fullscreen)
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(artifact.as_os_str().to_os_string());

        let mut child = Supervised::spawn(&self.bin, &args, self.kind.bin_name())
            .map_err(PlaybackError::from)?;
        child.forward_lines();

        let limit = Duration::from_secs_f64(duration_secs.max(0.0));
        match child.wait_timeout(Some(limit), shutdown).await {
            // The player finishing on its own inside the window is fine.
            Ok(_status) => Ok(()),
            // The window elapsed; the player has been killed, as intended.
            Err(ProcessError::Timeout { .. }) => {
                debug!("playback window elapsed; player stopped");
                Ok(())
            }
            Err(ProcessError::Canceled) => Err(PlaybackError::Canceled),
            Err(ProcessError::Io(e)) => Err(PlaybackError::Io(e)),
        }
    }
}

/// Duration that still fits between `now` and `deadline`, never negative.
fn effective_duration(now: DateTime<Local>, deadline: DateTime<Local>, duration_secs: f64) -> f64 {
    let available = (deadline - now).num_milliseconds() as f64 / 1000.0;
    if duration_secs > available {
        available.max(0.0)
    } else {
        duration_secs
    }
}

/// Second-precision comparison of the actual end against the deadline.
fn ended_on_time(end: DateTime<Local>, deadline: DateTime<Local>) -> bool {
    end.timestamp() == deadline.timestamp()
}
