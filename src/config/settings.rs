//! Configuration settings and validation.

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::watcher::{EventMask, DEFAULT_MAX_PATH_LEN};
use crate::{Error, Result};

/// Smallest accepted path capacity.
const MIN_PATH_LEN: usize = 2;

/// Largest accepted path capacity.
const MAX_PATH_LEN: usize = 65536;

bitflags! {
    /// Construction flags, fixed for the lifetime of a watcher.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CreateFlags: u32 {
        /// `poll` blocks until at least one record is available.
        const BLOCKING = 1 << 1;
        /// Watch every directory beneath the root, including new ones.
        const RECURSIVE = 1 << 2;
    }
}

impl Default for CreateFlags {
    fn default() -> Self {
        Self::RECURSIVE
    }
}

/// Configuration for one watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Directory to watch.
    pub root: PathBuf,

    /// Watch the whole tree rather than the root alone.
    pub recursive: bool,

    /// Block in `poll` until data is available.
    pub blocking: bool,

    /// Event kinds delivered to the handler.
    pub events: EventMask,

    /// Path capacity in bytes, terminator included.
    pub max_path_len: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: true,
            blocking: false,
            events: EventMask::ALL,
            max_path_len: DEFAULT_MAX_PATH_LEN,
        }
    }
}

impl WatchConfig {
    /// Create a configuration for `root` with defaults.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from construction flags.
    #[must_use]
    pub fn from_flags(flags: CreateFlags, events: EventMask, root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            recursive: flags.contains(CreateFlags::RECURSIVE),
            blocking: flags.contains(CreateFlags::BLOCKING),
            events,
            ..Self::default()
        }
    }

    /// Construction flags equivalent to this configuration.
    #[must_use]
    pub fn flags(&self) -> CreateFlags {
        let mut flags = CreateFlags::empty();
        flags.set(CreateFlags::RECURSIVE, self.recursive);
        flags.set(CreateFlags::BLOCKING, self.blocking);
        flags
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("root cannot be empty"));
        }

        if !(MIN_PATH_LEN..=MAX_PATH_LEN).contains(&self.max_path_len) {
            return Err(Error::config(format!(
                "max_path_len must be between {MIN_PATH_LEN} and {MAX_PATH_LEN}, got {}",
                self.max_path_len
            )));
        }

        Ok(())
    }
}
