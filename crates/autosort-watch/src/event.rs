//! Events published by the watch coordinator.

use std::path::PathBuf;

use serde::Serialize;

use autosort_ops::ExecutionReport;

/// Something the coordinator did for a watched folder.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WatchEvent {
    /// A file was run through the folder's rules.
    Processed {
        folder: PathBuf,
        profile: String,
        report: ExecutionReport,
    },
    /// A file was seen but not processed.
    Skipped {
        folder: PathBuf,
        path: PathBuf,
        reason: String,
    },
    /// The folder was paused because it became inaccessible.
    Paused { folder: PathBuf, reason: String },
}

impl WatchEvent {
    /// The watched folder this event belongs to.
    pub fn folder(&self) -> &PathBuf {
        match self {
            Self::Processed { folder, .. }
            | Self::Skipped { folder, .. }
            | Self::Paused { folder, .. } => folder,
        }
    }
}
