//! The watcher: owns the registry and the event source, and turns raw
//! records into normalized events on the calling thread.

use std::fmt;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::events::{Event, EventHandler};
use super::installer::Installer;
use super::pairing::{MovePairing, Moved};
use super::path::PathBuilder;
use super::provider::{HeapProvider, PathLease, ResourceProvider};
use super::registry::WatchRegistry;
use super::source::{EventSource, RawKind, RawRecord, WatchHandle};
use crate::config::WatchConfig;
use crate::error::WatcherError;
use crate::Result;

/// Counters describing monitoring gaps and throughput.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStats {
    /// Live watches.
    pub watches: usize,
    /// Directories that could not be registered.
    pub registrations_failed: u64,
    /// Branches skipped because their path would not fit.
    pub branches_abandoned: u64,
    /// Events handed to a handler.
    pub events_dispatched: u64,
    /// Raw records dropped (unknown watch, unbuildable path).
    pub records_dropped: u64,
    /// Queue overflows reported by the source.
    pub overflows: u64,
}

/// A directory tree watch.
///
/// Created once, polled from one thread at a time, destroyed exactly once
/// (by [`Watcher::destroy`] or by dropping it).
pub struct Watcher<S: EventSource> {
    pub(super) source: S,
    pub(super) registry: WatchRegistry,
    pub(super) config: WatchConfig,
    pub(super) root: PathBuf,
    pub(super) paths: PathBuilder,
    pub(super) provider: Arc<dyn ResourceProvider>,
    pub(super) stats: WatcherStats,
}

#[cfg(target_os = "linux")]
impl Watcher<super::linux::InotifySource> {
    /// Watch `root` with inotify.
    ///
    /// # Arguments
    ///
    /// * `flags` - Recursion and blocking behavior
    /// * `events` - Event kinds delivered to the handler; overflow is always delivered
    /// * `root` - Directory to watch
    /// * `provider` - Supplies registry paths for the watcher's lifetime; heap
    ///   allocation is used when `None`
    ///
    /// # Returns
    ///
    /// A watcher with every directory of the tree already registered.
    ///
    /// # Errors
    ///
    /// Fails if inotify cannot be initialized or `root` cannot be watched.
    pub fn create(
        flags: crate::config::CreateFlags,
        events: super::EventMask,
        root: impl AsRef<Path>,
        provider: Option<Arc<dyn ResourceProvider>>,
    ) -> Result<Self> {
        let config = WatchConfig::from_flags(flags, events, root.as_ref());
        Self::open(&config, provider)
    }

    /// Watch with inotify using a full configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, inotify cannot be initialized
    /// or the root cannot be watched.
    pub fn open(config: &WatchConfig, provider: Option<Arc<dyn ResourceProvider>>) -> Result<Self> {
        config.validate()?;
        let interest = super::source::interest_for(config.events, config.recursive);
        let source = super::linux::InotifySource::new(interest)?;
        Self::with_source(source, config, provider)
    }
}

impl<S: EventSource> Watcher<S> {
    /// Watch `config.root` through `source`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the root is not a directory
    /// that can be watched. No watcher is returned then and everything
    /// acquired so far is released.
    pub fn with_source(
        source: S,
        config: &WatchConfig,
        provider: Option<Arc<dyn ResourceProvider>>,
    ) -> Result<Self> {
        config.validate()?;

        let root = absolute(&config.root)?;
        let meta = fs::metadata(&root).map_err(|e| WatcherError::watch_failed(&root, e))?;
        if !meta.is_dir() {
            return Err(WatcherError::watch_failed(&root, "not a directory").into());
        }

        let mut watcher = Self {
            source,
            registry: WatchRegistry::new(),
            config: config.clone(),
            root,
            paths: PathBuilder::new(config.max_path_len),
            provider: provider.unwrap_or_else(|| Arc::new(HeapProvider)),
            stats: WatcherStats::default(),
        };

        let root = watcher.root.clone();
        let report = watcher.installer().install(&root, config.recursive)?;
        watcher.stats.registrations_failed += report.failed as u64;
        watcher.stats.branches_abandoned += report.abandoned as u64;

        tracing::info!(
            root = %root.display(),
            watches = watcher.registry.len(),
            failed = report.failed,
            abandoned = report.abandoned,
            recursive = config.recursive,
            blocking = config.blocking,
            "Watcher created"
        );

        Ok(watcher)
    }

    /// Read pending records and dispatch the resulting events to `handler`.
    ///
    /// In blocking mode the first read waits for data; the rest of the poll
    /// drains without waiting.
    ///
    /// # Arguments
    ///
    /// * `handler` - Receives each event; `ControlFlow::Break` ends the poll
    ///   and discards records already read but not yet dispatched
    /// * `provider` - Supplies the paths built during this call; heap
    ///   allocation is used when `None`. All of them are released before the
    ///   call returns.
    pub fn poll<H>(&mut self, handler: &mut H, provider: Option<&dyn ResourceProvider>)
    where
        H: EventHandler + ?Sized,
    {
        let provider = provider.unwrap_or(&HeapProvider);
        let mut pairing = MovePairing::new();
        let mut wait = self.config.blocking;
        let before = self.stats.events_dispatched;

        loop {
            let batch = match self.source.read_batch(wait) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(error = %e, "Reading notifications failed");
                    break;
                }
            };
            wait = false;

            if batch.is_empty() {
                break;
            }

            for record in batch {
                if self.process(record, &mut pairing, handler, provider).is_break() {
                    tracing::debug!("Handler stopped the poll");
                    // Not dispatched, but the registry must still follow the directory
                    if let Some(moved) = pairing.finish().filter(|m| m.is_dir) {
                        self.directory_moved(moved.from.as_deref(), None);
                    }
                    return;
                }
            }
        }

        if let Some(moved) = pairing.finish() {
            let _ = self.dispatch_move(moved, handler);
        }

        tracing::trace!(
            dispatched = self.stats.events_dispatched - before,
            "Poll finished"
        );
    }

    /// Tear the watcher down, releasing every watch and registry path.
    pub fn destroy(self) {
        drop(self);
    }

    /// Number of watched directories.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.registry.len()
    }

    /// Watched directories, sorted.
    #[must_use]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.registry.iter().map(|(_, p)| p.to_path_buf()).collect();
        dirs.sort();
        dirs
    }

    /// Whether `path` is a watched directory.
    #[must_use]
    pub fn is_watched(&self, path: &Path) -> bool {
        self.registry.find_handle(path).is_some()
    }

    /// Absolute root of the watch.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> WatcherStats {
        WatcherStats {
            watches: self.registry.len(),
            ..self.stats
        }
    }

    #[cfg(test)]
    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub(super) fn installer(&mut self) -> Installer<'_, S> {
        Installer {
            source: &mut self.source,
            registry: &mut self.registry,
            provider: self.provider.as_ref(),
            paths: self.paths,
        }
    }

    fn process<'p, H>(
        &mut self,
        record: RawRecord,
        pairing: &mut MovePairing<PathLease<'p>>,
        handler: &mut H,
        provider: &'p dyn ResourceProvider,
    ) -> ControlFlow<()>
    where
        H: EventHandler + ?Sized,
    {
        tracing::trace!(?record, "Raw record");

        if record.kind.contains(RawKind::QUEUE_OVERFLOWED) {
            self.stats.overflows += 1;
            tracing::warn!("Notification queue overflowed, events were lost");
            return self.dispatch(handler, Event::Overflow);
        }

        let Some(handle) = record.handle else {
            return ControlFlow::Continue(());
        };

        if record.kind.contains(RawKind::SELF_DELETED) {
            self.watch_gone(handle);
            return ControlFlow::Continue(());
        }

        let Some(path) = self.resolve(handle, &record, provider) else {
            return ControlFlow::Continue(());
        };

        let kind = record.kind;
        if kind.contains(RawKind::CREATED) {
            if record.is_dir && self.config.recursive {
                self.directory_created(&path);
            }
            self.dispatch(handler, Event::Create(&path))
        } else if kind.contains(RawKind::REMOVED) {
            if record.is_dir {
                self.directory_removed(&path);
            }
            self.dispatch(handler, Event::Remove(&path))
        } else if kind.contains(RawKind::MODIFIED) {
            self.dispatch(handler, Event::Modify(&path))
        } else if kind.contains(RawKind::RENAMED_FROM) {
            match pairing.depart(path, record.cookie, record.is_dir) {
                Some(moved) => self.dispatch_move(moved, handler),
                None => ControlFlow::Continue(()),
            }
        } else if kind.contains(RawKind::RENAMED_TO) {
            for moved in pairing.arrive(path, record.cookie, record.is_dir) {
                self.dispatch_move(moved, handler)?;
            }
            ControlFlow::Continue(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Full path of the entry a record names, or `None` if the record must
    /// be dropped.
    fn resolve<'p>(
        &mut self,
        handle: WatchHandle,
        record: &RawRecord,
        provider: &'p dyn ResourceProvider,
    ) -> Option<PathLease<'p>> {
        let Some(dir) = self.registry.find_path(handle) else {
            self.stats.records_dropped += 1;
            tracing::debug!(%handle, "Dropping record for unknown watch");
            return None;
        };

        let name = record.name.as_deref().unwrap_or_default();
        match self.paths.child(provider, dir, name) {
            Ok(path) => Some(path),
            Err(e) => {
                self.stats.records_dropped += 1;
                tracing::warn!(%handle, error = %e, "Dropping record");
                None
            }
        }
    }

    fn dispatch<H>(&mut self, handler: &mut H, event: Event<'_>) -> ControlFlow<()>
    where
        H: EventHandler + ?Sized,
    {
        if !event.kind().selected_by(self.config.events) {
            return ControlFlow::Continue(());
        }
        self.stats.events_dispatched += 1;
        handler.handle(event)
    }

    fn dispatch_move<H>(&mut self, moved: Moved<PathLease<'_>>, handler: &mut H) -> ControlFlow<()>
    where
        H: EventHandler + ?Sized,
    {
        let from = moved.from.as_deref();
        let to = moved.to.as_deref();
        debug_assert!(from.is_some() || to.is_some());

        if moved.is_dir {
            self.directory_moved(from, to);
        }
        self.dispatch(handler, Event::Move { from, to })
    }
}

impl<S: EventSource> Drop for Watcher<S> {
    fn drop(&mut self) {
        let watches = self.registry.len();
        for (handle, path) in self.registry.drain() {
            self.source.remove_watch(handle);
            self.provider.release(path);
        }
        tracing::info!(root = %self.root.display(), watches, "Watcher destroyed");
    }
}

impl<S: EventSource + fmt::Debug> fmt::Debug for Watcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("root", &self.root)
            .field("source", &self.source)
            .field("watches", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// `path` made absolute against the current directory with `.` components
/// dropped. Symlinks and `..` are left alone.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}
