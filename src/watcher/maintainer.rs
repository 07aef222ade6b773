//! Keeps the registry in step with directories created, removed and moved
//! while the watcher runs. None of this produces events of its own.

use std::path::Path;

use super::installer::InstallReport;
use super::provider::PathLease;
use super::source::{EventSource, WatchHandle};
use super::state::Watcher;

impl<S: EventSource> Watcher<S> {
    /// A directory appeared: watch it and anything created in it before the
    /// watch landed.
    pub(super) fn directory_created(&mut self, path: &Path) {
        match self.installer().install(path, true) {
            Ok(report) => self.note_install(path, report),
            Err(e) => {
                self.stats.registrations_failed += 1;
                tracing::warn!(error = %e, "New directory left unmonitored");
            }
        }
    }

    /// A directory was removed from a watched parent.
    pub(super) fn directory_removed(&mut self, path: &Path) {
        self.deregister_subtree(path);
    }

    /// The source reported a watched directory gone.
    pub(super) fn watch_gone(&mut self, handle: WatchHandle) {
        self.deregister(handle);
    }

    /// A directory moved. Only the known endpoints are acted on: a move
    /// within the tree relocates registry paths, a departure drops the
    /// subtree, an arrival installs it.
    pub(super) fn directory_moved(&mut self, from: Option<&Path>, to: Option<&Path>) {
        match (from, to) {
            (Some(from), Some(to)) => self.relocate(from, to),
            (Some(from), None) => self.deregister_subtree(from),
            (None, Some(to)) if self.config.recursive => self.directory_created(to),
            _ => {}
        }
    }

    fn note_install(&mut self, path: &Path, report: InstallReport) {
        self.stats.registrations_failed += report.failed as u64;
        self.stats.branches_abandoned += report.abandoned as u64;
        tracing::debug!(
            path = %path.display(),
            registered = report.registered,
            failed = report.failed,
            "Installed new directory"
        );
    }

    fn deregister(&mut self, handle: WatchHandle) {
        let Some(path) = self.registry.remove(handle) else {
            return;
        };
        self.source.remove_watch(handle);
        tracing::debug!(%handle, path = %path.display(), "Stopped watching directory");
        self.provider.release(path);
    }

    fn deregister_subtree(&mut self, root: &Path) {
        for handle in self.registry.handles_under(root) {
            self.deregister(handle);
        }
    }

    /// Rewrite every registry path under `from` to sit under `to`.
    fn relocate(&mut self, from: &Path, to: &Path) {
        for handle in self.registry.handles_under(from) {
            let Some(old) = self.registry.find_path(handle) else {
                continue;
            };
            let moved = match old.strip_prefix(from) {
                Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };

            let copied = self
                .paths
                .copy(self.provider.as_ref(), &moved)
                .map(PathLease::into_inner);
            match copied {
                Ok(path) => {
                    tracing::debug!(%handle, path = %moved.display(), "Watched directory moved");
                    if let Some(old) = self.registry.insert(handle, path) {
                        self.provider.release(old);
                    }
                }
                Err(e) => {
                    tracing::warn!(%handle, error = %e, "Cannot track moved directory");
                    self.deregister(handle);
                }
            }
        }
    }
}
