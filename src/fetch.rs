//! Remote image retrieval.
//!
//! The remote API is a three-step protocol: GET the playlist resource for a
//! JSON list of resolver URLs, GET each resolver for the final binary URL,
//! then stream each binary to disk. Every step is retried under the
//! configured [`RetryPolicy`] against a transport-failure predicate.
//!
//! Downloads land in a fresh timestamped subfolder per run, so a failed
//! run's partial set stays on disk for inspection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::retry::{retry, RetryPolicy};

/// Error type for image retrieval.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (timeout, connection refused, ...).
    /// Recoverable; governed by the retry policy.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The whole run produced zero usable images.
    #[error("no images could be downloaded from {api}")]
    NoImages { api: String },

    /// Local filesystem failure while storing a download.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// `true` for failures the retry policy may re-attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => is_transport_error(e),
            _ => false,
        }
    }
}

/// Transport-failure predicate for the retry loop.
///
/// HTTP responses with an error status are deliberately excluded: a 4xx/5xx
/// answer is a server decision, not a flaky link, and is surfaced
/// immediately.
pub fn is_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[derive(Debug, Deserialize)]
struct Playlist {
    playlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Resolved {
    url: String,
}

/// Source of the per-run image set.
///
/// The seam exists so the pipeline can be exercised against local fixtures;
/// production uses [`RemoteImageSource`].
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Retrieves one run's images into a fresh subfolder of `storage_root`
    /// and returns their paths in playlist order.
    async fn fetch(&self, storage_root: &Path) -> Result<Vec<PathBuf>, FetchError>;
}

/// Downloads images from the remote playlist API.
pub struct RemoteImageSource {
    client: reqwest::Client,
    api: String,
    policy: RetryPolicy,
}

impl RemoteImageSource {
    /// Client with bounded per-request timeouts pointed at `api`.
    pub fn new(api: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api: api.into(),
            policy: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let client = &self.client;
        retry(
            &self.policy,
            || async move {
                let value = client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<T>()
                    .await?;
                Ok::<T, FetchError>(value)
            },
            FetchError::is_retryable,
        )
        .await
    }

    async fn download(&self, url: &str, dir: &Path, index: usize) -> Result<PathBuf, FetchError> {
        let name = file_name_for(url, index);
        let target = dir.join(name);

        let client = &self.client;
        let path = &target;
        retry(
            &self.policy,
            || async move {
                let response = client.get(url).send().await?.error_for_status()?;

                let mut file = tokio::fs::File::create(path).await?;
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    file.write_all(&chunk?).await?;
                }
                file.flush().await?;
                Ok::<(), FetchError>(())
            },
            FetchError::is_retryable,
        )
        .await?;

        Ok(target)
    }
}

#[async_trait]
impl ImageSource for RemoteImageSource {
    async fn fetch(&self, storage_root: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let stamp = Local::now().format("%Y-%m%d-%H%M-%S").to_string();
        let run_dir = storage_root.join(stamp);
        tokio::fs::create_dir_all(&run_dir).await?;

        // Playlist failure is run-fatal; everything below is per-item.
        let playlist: Playlist = self.get_json(&self.api).await?;
        debug!("playlist holds {} items", playlist.playlist.len());

        let mut images = Vec::with_capacity(playlist.playlist.len());
        for (index, resolver) in playlist.playlist.iter().enumerate() {
            let resolved: Resolved = match self.get_json(resolver).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping item {index}: resolver {resolver} failed: {e}");
                    continue;
                }
            };

            match self.download(&resolved.url, &run_dir, index).await {
                Ok(path) => images.push(path),
                Err(e) => warn!("skipping item {index}: download {} failed: {e}", resolved.url),
            }
        }

        if images.is_empty() {
            // Nothing worth keeping; drop the empty run folder.
            let _ = tokio::fs::remove_dir_all(&run_dir).await;
            return Err(FetchError::NoImages {
                api: self.api.clone(),
            });
        }

        info!("downloaded {} images into {}", images.len(), run_dir.display());
        Ok(images)
    }
}

/// Local file name for a binary URL: its last path segment, query stripped,
/// with a positional fallback for unusable URLs.
fn file_name_for(url: &str, index: usize) -> String {
    let name = url
        .split('/')
        .next_back()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");

    if name.is_empty() {
        format!("image-{index}")
    } else {
        name.to_string()
    }
}
