//! Error types for folder watching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised when a folder is added to or managed by the coordinator.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Folder does not exist.
    #[error("Folder not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a folder.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The folder is already bound to a profile.
    #[error("Already watching {path}")]
    AlreadyWatched { path: PathBuf },

    /// The folder is not being watched.
    #[error("Not watching {path}")]
    NotWatched { path: PathBuf },

    /// The filesystem watcher could not be set up.
    #[error("Cannot watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WatchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a watcher error with path context.
    pub fn notify(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        Self::Notify {
            path: path.into(),
            source,
        }
    }
}
