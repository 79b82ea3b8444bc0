//! Supervised child processes.
//!
//! Every external tool (encoder, prober, player) runs through [`Supervised`]:
//! spawn with piped output, forward output lines to the log under a fixed
//! tag, wait with an optional hard timeout, and kill explicitly on timeout or
//! daemon shutdown. A timed-out or cancelled child is never left detached.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error type for supervised child processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The child did not exit within the wall-clock limit and was killed.
    #[error("child process exceeded its {limit:?} time limit")]
    Timeout { limit: Duration },

    /// Daemon shutdown interrupted the wait; the child was killed.
    #[error("child process wait interrupted by shutdown")]
    Canceled,

    /// Spawn or wait failed at the OS level.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A spawned child process with its output readers.
pub struct Supervised {
    child: Child,
    tag: String,
    readers: Vec<JoinHandle<()>>,
}

impl Supervised {
    /// Spawns `bin` with `args`, piping both output streams.
    ///
    /// `tag` prefixes every forwarded output line in the log.
    pub fn spawn(bin: &str, args: &[OsString], tag: &str) -> Result<Self, ProcessError> {
        let child = Command::new(bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        debug!("spawned {bin} (tag {tag})");
        Ok(Self {
            child,
            tag: tag.to_string(),
            readers: Vec::new(),
        })
    }

    /// Starts forwarding the child's combined output to the log, one line at
    /// a time, concurrently with any subsequent wait.
    pub fn forward_lines(&mut self) {
        if let Some(stdout) = self.child.stdout.take() {
            self.readers.push(forward(stdout, self.tag.clone()));
        }
        if let Some(stderr) = self.child.stderr.take() {
            self.readers.push(forward(stderr, self.tag.clone()));
        }
    }

    /// Waits for the child to exit.
    ///
    /// With `limit`, the wait is bounded: on expiry the child is killed and
    /// [`ProcessError::Timeout`] is returned. Cancelling `shutdown` also
    /// kills the child and returns [`ProcessError::Canceled`].
    pub async fn wait_timeout(
        &mut self,
        limit: Option<Duration>,
        shutdown: &CancellationToken,
    ) -> Result<ExitStatus, ProcessError> {
        let outcome = async {
            tokio::select! {
                status = self.child.wait() => Some(status),
                () = shutdown.cancelled() => None,
            }
        };

        let waited = match limit {
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, outcome).await;
                match bounded {
                    Ok(inner) => inner,
                    Err(_elapsed) => {
                        self.kill().await;
                        return Err(ProcessError::Timeout { limit });
                    }
                }
            }
            None => outcome.await,
        };

        match waited {
            Some(status) => Ok(status?),
            None => {
                self.kill().await;
                Err(ProcessError::Canceled)
            }
        }
    }

    /// Terminates the child and reaps it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("failed to kill {}: {e}", self.tag);
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

fn forward<R>(stream: R, tag: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{tag}: {line}");
        }
    })
}
