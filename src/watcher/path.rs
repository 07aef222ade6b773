//! Capacity-checked path construction.

use std::ffi::OsStr;
use std::path::Path;

use super::provider::{PathLease, ResourceProvider};
use crate::error::WatcherError;

/// Default path capacity in bytes, terminator included (Linux `PATH_MAX`).
pub const DEFAULT_MAX_PATH_LEN: usize = 4096;

/// Builds child paths while enforcing a maximum length.
///
/// A path fits when its byte length is strictly below `max_len`, leaving
/// room for the terminator the OS adds when the path crosses into a
/// system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathBuilder {
    max_len: usize,
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PATH_LEN)
    }
}

impl PathBuilder {
    /// Create a builder with the given capacity.
    #[must_use]
    pub const fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Configured capacity.
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Check that `path` fits.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::PathTooLong`] if it does not.
    pub fn check(&self, path: &Path) -> Result<(), WatcherError> {
        if path.as_os_str().len() >= self.max_len {
            return Err(WatcherError::PathTooLong {
                path: path.display().to_string(),
                max: self.max_len,
            });
        }
        Ok(())
    }

    /// Copy `path` into a provider buffer.
    ///
    /// # Errors
    ///
    /// Fails if the path does not fit or the provider refuses the buffer.
    pub fn copy<'p>(
        &self,
        provider: &'p dyn ResourceProvider,
        path: &Path,
    ) -> Result<PathLease<'p>, WatcherError> {
        self.check(path)?;
        PathLease::copy_of(provider, path)
    }

    /// Build `parent/name` in a provider buffer. An empty name yields a copy
    /// of `parent`.
    ///
    /// # Errors
    ///
    /// Fails if the joined path does not fit or the provider refuses the
    /// buffer. Nothing stays allocated on failure.
    pub fn child<'p>(
        &self,
        provider: &'p dyn ResourceProvider,
        parent: &Path,
        name: &OsStr,
    ) -> Result<PathLease<'p>, WatcherError> {
        if name.is_empty() {
            return self.copy(provider, parent);
        }

        let size = parent.as_os_str().len() + 1 + name.len();
        let mut lease = PathLease::acquire(provider, size)?;
        let buf = lease.buf_mut();
        buf.push(parent);
        buf.push(name);
        self.check(&lease)?;
        Ok(lease)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::provider::{BudgetProvider, HeapProvider};
    use std::path::PathBuf;

    #[test]
    fn test_child_joins_with_one_separator() {
        let builder = PathBuilder::default();
        let lease = builder
            .child(&HeapProvider, Path::new("/w/src"), OsStr::new("main.rs"))
            .unwrap();
        assert_eq!(lease.as_path(), Path::new("/w/src/main.rs"));

        let lease = builder
            .child(&HeapProvider, Path::new("/"), OsStr::new("etc"))
            .unwrap();
        assert_eq!(lease.as_os_str(), "/etc");
    }

    #[test]
    fn test_child_empty_name_copies_parent() {
        let lease = PathBuilder::default()
            .child(&HeapProvider, Path::new("/w"), OsStr::new(""))
            .unwrap();
        assert_eq!(lease.as_path(), Path::new("/w"));
    }

    #[test]
    fn test_check_boundary() {
        let builder = PathBuilder::new(5);
        assert!(builder.check(Path::new("/abc")).is_ok());
        let err = builder.check(Path::new("/abcd")).unwrap_err();
        assert!(matches!(err, WatcherError::PathTooLong { max: 5, .. }));
    }

    #[test]
    fn test_child_too_long_releases_buffer() {
        let provider = BudgetProvider::new(1024);
        let builder = PathBuilder::new(8);
        let err = builder
            .child(&provider, Path::new("/w/deep"), OsStr::new("name"))
            .unwrap_err();
        assert!(matches!(err, WatcherError::PathTooLong { .. }));
        assert_eq!(provider.used(), 0);
    }

    #[test]
    fn test_child_provider_exhausted() {
        let provider = BudgetProvider::new(4);
        let err = PathBuilder::default()
            .child(&provider, Path::new("/w"), OsStr::new("file"))
            .unwrap_err();
        assert!(matches!(err, WatcherError::ProviderExhausted { .. }));
    }

    #[test]
    fn test_copy_checks_length() {
        let builder = PathBuilder::new(4);
        assert!(builder.copy(&HeapProvider, Path::new("/ab")).is_ok());
        assert!(builder
            .copy(&HeapProvider, &PathBuf::from("/abc"))
            .is_err());
    }
}
