//! dirwatch
//!
//! Normalized change notifications for a directory tree: creations,
//! removals, content modifications and moves, with rename halves paired
//! into single move events and the watch set kept in step with the tree.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod watcher;

pub use config::{CreateFlags, WatchConfig};
pub use error::{Error, Result, WatcherError};
#[cfg(target_os = "linux")]
pub use watcher::NativeWatcher;
pub use watcher::{
    Event, EventHandler, EventKind, EventMask, FileEvent, ResourceProvider, Watcher, WatcherStats,
};
