//! Injected allocation strategy for path buffers.
//!
//! Every path the watcher builds comes from a [`ResourceProvider`]. Registry
//! paths are drawn from the provider given at construction and handed back
//! when their entry is removed. Paths decoded during a poll are wrapped in a
//! [`PathLease`], which returns the buffer on drop, so nothing outlives the
//! poll call no matter how it exits.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::WatcherError;

/// Source of path buffers.
pub trait ResourceProvider: Send + Sync {
    /// Return a buffer able to hold at least `new_size` bytes.
    ///
    /// `old` is an earlier buffer from this provider to grow, or `None` for a
    /// fresh allocation. On failure the provider takes `old` back as if it
    /// had been released.
    fn allocate(&self, old: Option<PathBuf>, new_size: usize) -> Option<PathBuf>;

    /// Take back a buffer obtained from [`ResourceProvider::allocate`].
    fn release(&self, buffer: PathBuf);
}

/// Plain heap allocation; the default when no provider is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapProvider;

impl ResourceProvider for HeapProvider {
    fn allocate(&self, old: Option<PathBuf>, new_size: usize) -> Option<PathBuf> {
        let mut buf = old.unwrap_or_default();
        buf.reserve(new_size.saturating_sub(buf.as_os_str().len()));
        Some(buf)
    }

    fn release(&self, buffer: PathBuf) {
        drop(buffer);
    }
}

/// Provider with a fixed byte budget, refunded on release.
///
/// Useful to bound how much memory a single poll may spend on paths.
#[derive(Debug)]
pub struct BudgetProvider {
    limit: usize,
    used: Mutex<usize>,
}

impl BudgetProvider {
    /// Create a provider that hands out at most `limit` bytes at a time.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            used: Mutex::new(0),
        }
    }

    /// Bytes currently handed out.
    #[must_use]
    pub fn used(&self) -> usize {
        *self.used.lock()
    }

    /// Bytes still available.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit - self.used()
    }
}

impl ResourceProvider for BudgetProvider {
    fn allocate(&self, old: Option<PathBuf>, new_size: usize) -> Option<PathBuf> {
        let mut used = self.used.lock();
        let old_cap = old.as_ref().map_or(0, PathBuf::capacity);
        let extra = new_size.saturating_sub(old_cap);

        if *used + extra > self.limit {
            *used -= old_cap;
            return None;
        }

        let mut buf = old.unwrap_or_default();
        buf.reserve_exact(new_size.saturating_sub(buf.as_os_str().len()));
        *used = *used - old_cap + buf.capacity();
        if *used > self.limit {
            // The allocator rounded past the budget
            *used -= buf.capacity();
            return None;
        }
        Some(buf)
    }

    fn release(&self, buffer: PathBuf) {
        let mut used = self.used.lock();
        *used = used.saturating_sub(buffer.capacity());
    }
}

/// A provider-owned path buffer that is released when dropped.
pub struct PathLease<'p> {
    buf: Option<PathBuf>,
    provider: &'p dyn ResourceProvider,
}

impl<'p> PathLease<'p> {
    /// Acquire an empty buffer of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ProviderExhausted`] if the provider refuses.
    pub fn acquire(provider: &'p dyn ResourceProvider, size: usize) -> Result<Self, WatcherError> {
        let buf = provider
            .allocate(None, size)
            .ok_or(WatcherError::ProviderExhausted { requested: size })?;
        Ok(Self {
            buf: Some(buf),
            provider,
        })
    }

    /// Acquire a buffer holding a copy of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ProviderExhausted`] if the provider refuses.
    pub fn copy_of(provider: &'p dyn ResourceProvider, path: &Path) -> Result<Self, WatcherError> {
        let mut lease = Self::acquire(provider, path.as_os_str().len())?;
        lease.buf_mut().push(path);
        Ok(lease)
    }

    /// Borrow the path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        self.buf.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Keep the buffer past this lease. The caller becomes responsible for
    /// handing it back to the same provider.
    #[must_use]
    pub fn into_inner(mut self) -> PathBuf {
        self.buf.take().unwrap_or_default()
    }

    pub(crate) fn buf_mut(&mut self) -> &mut PathBuf {
        self.buf.get_or_insert_with(PathBuf::new)
    }
}

impl Deref for PathLease<'_> {
    type Target = Path;

    fn deref(&self) -> &Path {
        self.as_path()
    }
}

impl AsRef<Path> for PathLease<'_> {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Debug for PathLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathLease").field(&self.as_path()).finish()
    }
}

impl Drop for PathLease<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.provider.release(buf);
        }
    }
}
