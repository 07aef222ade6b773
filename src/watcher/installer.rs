//! Recursive registration of a directory tree.
//!
//! Symlinked directories are followed; a directory reached twice (through a
//! link or a cycle) keeps its first path and is not descended again.
//! Failures below the root never abort the walk: the affected subtree is
//! left unmonitored and the walk moves on to its siblings.

use std::path::Path;

use walkdir::WalkDir;

use super::path::PathBuilder;
use super::provider::ResourceProvider;
use super::registry::WatchRegistry;
use super::source::{EventSource, WatchHandle};
use crate::error::WatcherError;

/// Outcome of one tree install.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    /// Directories newly registered, root included.
    pub registered: usize,
    /// Directories that could not be watched or read.
    pub failed: usize,
    /// Branches skipped because their path would not fit.
    pub abandoned: usize,
}

/// Result of registering one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    New(WatchHandle),
    /// The source already watched this directory under another path.
    Existing(WatchHandle),
}

/// Everything needed to register directories.
pub struct Installer<'a, S> {
    pub source: &'a mut S,
    pub registry: &'a mut WatchRegistry,
    pub provider: &'a dyn ResourceProvider,
    pub paths: PathBuilder,
}

impl<S: EventSource> Installer<'_, S> {
    /// Register a single directory.
    ///
    /// # Errors
    ///
    /// Fails if the path does not fit, the provider refuses the buffer or
    /// the source cannot watch the directory. Nothing is registered then.
    pub fn register(&mut self, path: &Path) -> Result<Registration, WatcherError> {
        let lease = self.paths.copy(self.provider, path)?;
        let handle = self
            .source
            .add_watch(path)
            .map_err(|e| WatcherError::watch_failed(path, e))?;

        if self.registry.contains(handle) {
            return Ok(Registration::Existing(handle));
        }

        self.registry.insert(handle, lease.into_inner());
        tracing::debug!(%handle, path = %path.display(), "Watching directory");
        Ok(Registration::New(handle))
    }

    /// Register `root` and, when `recursive`, every directory beneath it.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory to register first
    /// * `recursive` - Also walk and register the tree beneath `root`
    ///
    /// # Returns
    ///
    /// Counts of registered, failed and abandoned directories. A root that is
    /// already watched yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns the error from registering `root` itself; failures deeper in
    /// the tree are only counted in the report.
    pub fn install(&mut self, root: &Path, recursive: bool) -> Result<InstallReport, WatcherError> {
        let mut report = InstallReport::default();

        match self.register(root)? {
            Registration::New(_) => report.registered += 1,
            Registration::Existing(_) => return Ok(report),
        }

        if !recursive {
            return Ok(report);
        }

        let mut walker = WalkDir::new(root).min_depth(1).follow_links(true).into_iter();
        loop {
            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Skipping unreadable directory entry");
                    report.failed += 1;
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            match self.register(entry.path()) {
                Ok(Registration::New(_)) => report.registered += 1,
                Ok(Registration::Existing(handle)) => {
                    tracing::debug!(
                        %handle,
                        path = %entry.path().display(),
                        "Directory already watched, not descending"
                    );
                    walker.skip_current_dir();
                }
                Err(e @ WatcherError::PathTooLong { .. }) => {
                    tracing::warn!(error = %e, "Abandoning branch");
                    report.abandoned += 1;
                    walker.skip_current_dir();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Subtree left unmonitored");
                    report.failed += 1;
                    walker.skip_current_dir();
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::provider::HeapProvider;
    use crate::watcher::source::scripted::ScriptedSource;
    use std::fs;
    use tempfile::TempDir;

    fn install(
        source: &mut ScriptedSource,
        registry: &mut WatchRegistry,
        paths: PathBuilder,
        root: &Path,
        recursive: bool,
    ) -> Result<InstallReport, WatcherError> {
        Installer {
            source,
            registry,
            provider: &HeapProvider,
            paths,
        }
        .install(root, recursive)
    }

    #[test]
    fn test_install_registers_every_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
        fs::create_dir_all(tmp.path().join("d")).unwrap();
        fs::write(tmp.path().join("a/file.txt"), "x").unwrap();

        let mut source = ScriptedSource::new();
        let mut registry = WatchRegistry::new();
        let report = install(
            &mut source,
            &mut registry,
            PathBuilder::default(),
            tmp.path(),
            true,
        )
        .unwrap();

        assert_eq!(report.registered, 5);
        assert_eq!(registry.len(), 5);
        assert!(registry.find_handle(&tmp.path().join("a/b/c")).is_some());
        assert!(registry.find_handle(&tmp.path().join("a/file.txt")).is_none());
    }

    #[test]
    fn test_install_flat_registers_root_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();

        let mut source = ScriptedSource::new();
        let mut registry = WatchRegistry::new();
        let report = install(
            &mut source,
            &mut registry,
            PathBuilder::default(),
            tmp.path(),
            false,
        )
        .unwrap();

        assert_eq!(report.registered, 1);
        assert_eq!(registry.find_handle(tmp.path()), source.handle_of(tmp.path()));
    }

    #[test]
    fn test_refused_directory_skips_subtree_and_continues() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("locked/inner")).unwrap();
        fs::create_dir_all(tmp.path().join("open")).unwrap();

        let mut source = ScriptedSource::new();
        source.refuse.insert(tmp.path().join("locked"));
        let mut registry = WatchRegistry::new();
        let report = install(
            &mut source,
            &mut registry,
            PathBuilder::default(),
            tmp.path(),
            true,
        )
        .unwrap();

        assert_eq!(report.failed, 1);
        assert!(registry.find_handle(&tmp.path().join("open")).is_some());
        assert!(registry.find_handle(&tmp.path().join("locked")).is_none());
        assert!(registry
            .find_handle(&tmp.path().join("locked/inner"))
            .is_none());
    }

    #[test]
    fn test_refused_root_fails() {
        let tmp = TempDir::new().unwrap();
        let mut source = ScriptedSource::new();
        source.refuse.insert(tmp.path().to_path_buf());
        let mut registry = WatchRegistry::new();

        let err = install(
            &mut source,
            &mut registry,
            PathBuilder::default(),
            tmp.path(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, WatcherError::WatchFailed { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_long_branch_abandoned() {
        let tmp = TempDir::new().unwrap();
        let long_name = "n".repeat(40);
        fs::create_dir_all(tmp.path().join(&long_name).join("deeper")).unwrap();
        fs::create_dir_all(tmp.path().join("s")).unwrap();

        // Room for the root and short children, not the long branch
        let max = tmp.path().as_os_str().len() + 10;
        let mut source = ScriptedSource::new();
        let mut registry = WatchRegistry::new();
        let report = install(
            &mut source,
            &mut registry,
            PathBuilder::new(max),
            tmp.path(),
            true,
        )
        .unwrap();

        assert_eq!(report.abandoned, 1);
        assert_eq!(report.registered, 2);
        assert!(registry.find_handle(&tmp.path().join("s")).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_followed_once() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::create_dir_all(outside.path().join("inner")).unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();
        // Cycle back to the root
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("loop")).unwrap();

        let mut source = ScriptedSource::new();
        let mut registry = WatchRegistry::new();
        install(
            &mut source,
            &mut registry,
            PathBuilder::default(),
            tmp.path(),
            true,
        )
        .unwrap();

        assert!(registry.find_handle(&tmp.path().join("link")).is_some());
        assert!(registry
            .find_handle(&tmp.path().join("link/inner"))
            .is_some());
        assert!(registry.find_handle(&tmp.path().join("loop")).is_none());
    }
}
