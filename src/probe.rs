//! Media duration probing via the external `avprobe` tool.
//!
//! The probe output carries a line of the form
//! `  Duration: 00:01:05.250000, start: 0.000000, bitrate: ...` on its error
//! stream; the timestamp token is the authoritative duration of an encoded
//! artifact, which can diverge from the encoder's estimate.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Error type for duration probing.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe binary could not be executed.
    #[error("failed to run probe tool: {0}")]
    Io(#[from] std::io::Error),

    /// No `Duration:` marker in the probe output. Explicitly not treated as
    /// a zero-length artifact.
    #[error("probe output carries no Duration marker")]
    MarkerMissing,

    /// The token after the marker did not parse as `H:MM:SS.ffffff`.
    #[error("malformed duration token: {0:?}")]
    BadTimestamp(String),
}

/// Wrapper over the external media-probe binary.
#[derive(Debug, Clone)]
pub struct Prober {
    bin: String,
}

impl Prober {
    /// Locate `avprobe` in `PATH`, falling back to the bare name.
    pub fn new() -> Self {
        let bin = which::which("avprobe")
            .map_or_else(|_| "avprobe".to_string(), |p| p.to_string_lossy().to_string());
        Self { bin }
    }

    /// Use a specific probe binary.
    #[must_use]
    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }

    /// Returns the duration of `path` in seconds.
    pub async fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        let output = Command::new(&self.bin)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let seconds = parse_probe_output(&stderr)?;
        debug!("probed {}: {seconds}s", path.display());
        Ok(seconds)
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the duration from the probe's error-stream text.
pub fn parse_probe_output(text: &str) -> Result<f64, ProbeError> {
    let line = text
        .lines()
        .find(|line| line.contains("Duration:"))
        .ok_or(ProbeError::MarkerMissing)?;

    let token = line
        .split("Duration:")
        .nth(1)
        .unwrap_or("")
        .split(',')
        .next()
        .unwrap_or("")
        .trim();

    parse_timestamp(token)
}

/// Parses `H:MM:SS.ffffff` into total seconds.
fn parse_timestamp(token: &str) -> Result<f64, ProbeError> {
    let bad = || ProbeError::BadTimestamp(token.to_string());

    let mut parts = token.split(':');
    let hours: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let minutes: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let seconds: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    if parts.next().is_some() {
        return Err(bad());
    }

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_reference_token() {
        let seconds = parse_probe_output("Duration: 00:01:05.250000,").unwrap();
        assert!((seconds - 65.25).abs() < 1e-9);
    }

    #[test]
    fn parses_a_realistic_stderr_blob() {
        let blob = "avprobe version 11.4\n\
                    Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'show.mp4':\n\
                    \x20 Duration: 01:02:03.500000, start: 0.000000, bitrate: 1205 kb/s\n\
                    \x20   Stream #0.0(und): Video: h264\n";
        let seconds = parse_probe_output(blob).unwrap();
        assert!((seconds - 3723.5).abs() < 1e-9);
    }

    #[test]
    fn missing_marker_is_an_error_not_zero() {
        let err = parse_probe_output("no media here\n").unwrap_err();
        assert!(matches!(err, ProbeError::MarkerMissing));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let err = parse_probe_output("Duration: N/A, bitrate: N/A\n").unwrap_err();
        assert!(matches!(err, ProbeError::BadTimestamp(_)));

        let err = parse_probe_output("Duration: 00:01,\n").unwrap_err();
        assert!(matches!(err, ProbeError::BadTimestamp(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probes_via_a_stub_binary() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("avprobe-stub");
        {
            let mut f = std::fs::File::create(&stub).unwrap();
            writeln!(f, "#!/bin/sh").unwrap();
            writeln!(f, "echo 'Duration: 00:00:15.000000, start: 0.0' >&2").unwrap();
        }
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = Prober::new().with_bin(stub.to_string_lossy().to_string());
        let seconds = prober.probe(Path::new("whatever.mp4")).await.unwrap();
        assert!((seconds - 15.0).abs() < 1e-9);
    }
}
