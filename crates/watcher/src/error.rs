//! Error type for watch sessions

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening a watch or classifying its events
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry disappeared between the notification and its inspection
    #[error("path vanished before it could be inspected: {0}")]
    Vanished(PathBuf),

    #[error("invalid filter pattern '{pattern}': {source}")]
    Filter {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Raw notifications were lost, either in the kernel or between the
    /// OS watcher and the classifier
    #[error("event buffer overflowed, notifications were dropped")]
    Overflow,

    /// Synthetic fault fed through the classification path
    #[error("injected fault: {0}")]
    Injected(String),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to spawn classifier thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl WatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WatchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for watch operations
pub type Result<T> = std::result::Result<T, WatchError>;
