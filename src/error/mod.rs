//! Error types and Result aliases for dirwatch.
//!
//! Only watcher construction can fail outright. Everything that goes wrong
//! while polling is absorbed locally and shows up as a log line, a stats
//! counter or a gap in the event stream.

use thiserror::Error;

/// Result type alias using dirwatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dirwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The native notification facility could not be initialized.
    #[error("failed to initialize notification source: {reason}")]
    InitFailed { reason: String },

    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// A path would not fit in the configured capacity.
    #[error("path '{path}' exceeds the maximum length of {max} bytes")]
    PathTooLong { path: String, max: usize },

    /// The resource provider refused an allocation.
    #[error("resource provider refused an allocation of {requested} bytes")]
    ProviderExhausted { requested: usize },
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl WatcherError {
    /// Create a watch failure for `path`.
    pub fn watch_failed(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
