//! Daemon configuration loaded from `/etc/slidekiosk/config.toml`.
//!
//! A single `[slidekiosk]` section of key/value pairs; every key has a
//! documented default, so an empty section is a valid configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::playback::PlayerKind;

/// Default parameter file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/slidekiosk/config.toml";

/// Default schedule file location.
pub const DEFAULT_SCHEDULE_PATH: &str = "/etc/slidekiosk/schedule.cfg";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config path {0:?} does not exist")]
    Missing(PathBuf),

    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Kiosk daemon parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// URL of the playlist resource of the remote image API.
    pub images_api: String,
    /// Folder that receives per-run image subfolders.
    pub downloaded_images_path: PathBuf,
    /// Folder that receives encoded slideshow videos.
    pub created_slide_shows_path: PathBuf,
    /// Folder scanned for a random background track.
    pub background_music_path: PathBuf,
    /// Seconds each image stays on screen.
    pub image_display_duration: u32,
    /// Encoder output resolution, `WxH`.
    pub slide_show_resolution: String,
    /// Minutes before a deadline that its pipeline run starts.
    pub launch_time_offset: i64,
    /// Seconds of a standard transition effect.
    pub transition_duration: u32,
    /// Hard wall-clock limit on a single encode.
    pub encode_timeout_secs: u64,
    /// Player backend: `mpv` or `vlc`.
    pub player: PlayerKind,
    /// Fullscreen playback.
    pub fullscreen: bool,
    /// Emit MP4 instead of the encoder's default container.
    pub mp4: bool,
    /// Attempt cap for remote calls when `infinite_retry` is off.
    pub download_attempts: u32,
    /// Retry remote calls without bound.
    pub infinite_retry: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            images_api: "http://localhost:8000/playlist".to_string(),
            downloaded_images_path: content_dir(dirs::picture_dir, "slidekiosk_images"),
            created_slide_shows_path: content_dir(dirs::video_dir, "slidekiosk_slide_shows"),
            background_music_path: content_dir(dirs::audio_dir, "slidekiosk_music"),
            image_display_duration: 15,
            slide_show_resolution: "1920x1080".to_string(),
            launch_time_offset: 7,
            transition_duration: 2,
            encode_timeout_secs: 900,
            player: PlayerKind::Mpv,
            fullscreen: true,
            mp4: true,
            download_attempts: 10,
            infinite_retry: true,
        }
    }
}

impl KioskConfig {
    /// Attempt cap for the retry policy; `None` retries without bound.
    pub fn retry_cap(&self) -> Option<u32> {
        if self.infinite_retry {
            None
        } else {
            Some(self.download_attempts.max(1))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    slidekiosk: KioskConfig,
}

/// Loads the parameter file. The file must exist; unknown or missing keys
/// fall back to the defaults.
pub fn load(path: &Path) -> Result<KioskConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&text)?;
    Ok(file.slidekiosk)
}

fn content_dir(base: fn() -> Option<PathBuf>, name: &str) -> PathBuf {
    base()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}
