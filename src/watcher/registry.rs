//! Mapping from watch handles to the directories they monitor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::source::WatchHandle;

/// Registry of live watches.
///
/// Holds at most one entry per handle; inserting an existing handle
/// replaces its path. Entries must be removed as soon as the OS drops the
/// watch, since handles may be reused afterwards.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: HashMap<WatchHandle, PathBuf>,
}

impl WatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` under `handle`, returning the path it replaced.
    pub fn insert(&mut self, handle: WatchHandle, path: PathBuf) -> Option<PathBuf> {
        self.entries.insert(handle, path)
    }

    /// Remove the entry for `handle`. Removing an absent handle is a no-op.
    pub fn remove(&mut self, handle: WatchHandle) -> Option<PathBuf> {
        self.entries.remove(&handle)
    }

    /// Path registered under `handle`.
    #[must_use]
    pub fn find_path(&self, handle: WatchHandle) -> Option<&Path> {
        self.entries.get(&handle).map(PathBuf::as_path)
    }

    /// Handle registered for exactly `path`.
    #[must_use]
    pub fn find_handle(&self, path: &Path) -> Option<WatchHandle> {
        self.entries
            .iter()
            .find_map(|(handle, p)| (p == path).then_some(*handle))
    }

    /// Whether `handle` has an entry.
    #[must_use]
    pub fn contains(&self, handle: WatchHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Handles whose path is `root` or lies beneath it.
    #[must_use]
    pub fn handles_under(&self, root: &Path) -> Vec<WatchHandle> {
        self.entries
            .iter()
            .filter(|(_, p)| p.starts_with(root))
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Iterate over all entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (WatchHandle, &Path)> {
        self.entries.iter().map(|(h, p)| (*h, p.as_path()))
    }

    /// Remove and yield every entry.
    pub fn drain(&mut self) -> impl Iterator<Item = (WatchHandle, PathBuf)> + '_ {
        self.entries.drain()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u64) -> WatchHandle {
        WatchHandle::new(n)
    }

    #[test]
    fn test_insert_and_find() {
        let mut registry = WatchRegistry::new();
        registry.insert(handle(1), PathBuf::from("/w"));
        registry.insert(handle(2), PathBuf::from("/w/src"));

        assert_eq!(registry.find_path(handle(1)), Some(Path::new("/w")));
        assert_eq!(registry.find_path(handle(2)), Some(Path::new("/w/src")));
        assert_eq!(registry.find_path(handle(3)), None);
        assert_eq!(registry.find_handle(Path::new("/w/src")), Some(handle(2)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_insert_replaces_existing_handle() {
        let mut registry = WatchRegistry::new();
        registry.insert(handle(1), PathBuf::from("/w/a"));
        let old = registry.insert(handle(1), PathBuf::from("/w/b"));

        assert_eq!(old, Some(PathBuf::from("/w/a")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_path(handle(1)), Some(Path::new("/w/b")));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = WatchRegistry::new();
        registry.insert(handle(1), PathBuf::from("/w"));

        assert!(registry.remove(handle(9)).is_none());
        assert_eq!(registry.remove(handle(1)), Some(PathBuf::from("/w")));
        assert!(registry.remove(handle(1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_grows_without_ceiling() {
        let mut registry = WatchRegistry::new();
        for n in 0..2000 {
            registry.insert(handle(n), PathBuf::from(format!("/w/{n}")));
        }
        for n in (0..2000).step_by(2) {
            registry.remove(handle(n));
        }

        assert_eq!(registry.len(), 1000);
        assert_eq!(registry.find_path(handle(1999)), Some(Path::new("/w/1999")));
        assert_eq!(registry.find_path(handle(1998)), None);
    }

    #[test]
    fn test_handles_under_matches_components() {
        let mut registry = WatchRegistry::new();
        registry.insert(handle(1), PathBuf::from("/w/a"));
        registry.insert(handle(2), PathBuf::from("/w/a/b"));
        registry.insert(handle(3), PathBuf::from("/w/ab"));

        let mut under = registry.handles_under(Path::new("/w/a"));
        under.sort_unstable();
        assert_eq!(under, vec![handle(1), handle(2)]);
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = WatchRegistry::new();
        registry.insert(handle(1), PathBuf::from("/w"));
        registry.insert(handle(2), PathBuf::from("/w/x"));

        assert_eq!(registry.drain().count(), 2);
        assert!(registry.is_empty());
    }
}
