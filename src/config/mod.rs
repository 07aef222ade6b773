//! Watcher configuration.
//!
//! Built programmatically or from the command line (see `main.rs`), then
//! checked with [`WatchConfig::validate`] before a watcher is created.

mod settings;

pub use settings::{CreateFlags, WatchConfig};
