//! Waiting for a file to stop changing before it is organized.

use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long a file must stay unchanged, and how long to wait for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityConfig {
    /// Size and modification time must be unchanged for this long.
    pub settle: Duration,
    /// Interval between checks.
    pub poll_interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of [`wait_until_stable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// The file stayed unchanged for the settle window.
    Stable,
    /// The file disappeared.
    Vanished,
    /// The file kept changing until the timeout.
    TimedOut,
    /// The wait was cancelled.
    Cancelled,
}

/// Size and modification time of a file at one moment.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

pub(crate) async fn snapshot(path: &Path) -> Option<Snapshot> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    Some(Snapshot {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// Wait until `path` has kept the same size and modification time for the
/// settle window.
pub async fn wait_until_stable(
    path: &Path,
    config: &StabilityConfig,
    cancel: &CancellationToken,
) -> Stability {
    let started = Instant::now();
    let Some(mut last) = snapshot(path).await else {
        return Stability::Vanished;
    };
    let mut unchanged_since = started;

    loop {
        let now = Instant::now();
        if now.duration_since(unchanged_since) >= config.settle {
            return Stability::Stable;
        }
        if now.duration_since(started) >= config.timeout {
            return Stability::TimedOut;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Stability::Cancelled,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        match snapshot(path).await {
            None => return Stability::Vanished,
            Some(current) if current != last => {
                last = current;
                unchanged_since = Instant::now();
            }
            Some(_) => {}
        }
    }
}
