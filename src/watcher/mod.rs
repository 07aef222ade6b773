//! Directory tree watching.
//!
//! This module provides:
//! - A registry of watched directories keyed by watch handle
//! - Recursive installation of watches over a directory tree
//! - Decoding of raw notifications into create/remove/modify/move events
//! - Pairing of two-part rename notifications into single move events
//! - Upkeep of the watch set as directories come and go

mod events;
#[cfg(target_os = "linux")]
mod linux;
mod installer;
mod maintainer;
mod pairing;
mod path;
mod provider;
mod registry;
mod source;
mod state;

pub use events::{Event, EventHandler, EventKind, EventMask, FileEvent};
#[cfg(target_os = "linux")]
pub use linux::InotifySource;
pub use installer::{InstallReport, Installer, Registration};
pub use pairing::{MovePairing, Moved};
pub use path::{PathBuilder, DEFAULT_MAX_PATH_LEN};
pub use provider::{BudgetProvider, HeapProvider, PathLease, ResourceProvider};
pub use registry::WatchRegistry;
pub use source::{interest_for, EventSource, RawKind, RawRecord, WatchHandle};
pub use state::{Watcher, WatcherStats};

/// Watcher over the native source of the current platform.
#[cfg(target_os = "linux")]
pub type NativeWatcher = Watcher<InotifySource>;
