//! Linux event source backed by inotify.
//!
//! inotify reports a rename as `IN_MOVED_FROM` immediately followed by
//! `IN_MOVED_TO` carrying the same cookie. The pairing logic leans on that
//! but does not require it.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;

use inotify::{EventMask as NativeMask, Inotify, WatchDescriptor, WatchMask};

use super::source::{EventSource, RawKind, RawRecord, WatchHandle};
use crate::error::WatcherError;

/// Read buffer size; large enough for dozens of records per read.
const READ_BUFFER_LEN: usize = 4096;

/// [`EventSource`] over one inotify instance.
pub struct InotifySource {
    inotify: Inotify,
    mask: WatchMask,
    next_handle: u64,
    handles: HashMap<WatchDescriptor, WatchHandle>,
    descriptors: HashMap<WatchHandle, WatchDescriptor>,
    buffer: Vec<u8>,
}

impl InotifySource {
    /// Open an inotify instance subscribed to `interest` on every watch.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::InitFailed`] if inotify cannot be initialized.
    pub fn new(interest: RawKind) -> Result<Self, WatcherError> {
        let inotify = Inotify::init().map_err(|e| WatcherError::InitFailed {
            reason: e.to_string(),
        })?;

        Ok(Self {
            inotify,
            mask: watch_mask(interest),
            next_handle: 0,
            handles: HashMap::new(),
            descriptors: HashMap::new(),
            buffer: vec![0; READ_BUFFER_LEN],
        })
    }

    /// Number of live inotify watches.
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.descriptors.len()
    }

    fn forget(&mut self, handle: WatchHandle) -> Option<WatchDescriptor> {
        let wd = self.descriptors.remove(&handle)?;
        self.handles.remove(&wd);
        Some(wd)
    }
}

impl fmt::Debug for InotifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InotifySource")
            .field("mask", &self.mask)
            .field("watches", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl EventSource for InotifySource {
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
        let wd = self.inotify.watches().add(path, self.mask)?;

        // inotify hands back the existing descriptor for an inode it already watches
        if let Some(handle) = self.handles.get(&wd) {
            return Ok(*handle);
        }

        self.next_handle += 1;
        let handle = WatchHandle::new(self.next_handle);
        self.handles.insert(wd.clone(), handle);
        self.descriptors.insert(handle, wd);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) {
        let Some(wd) = self.forget(handle) else {
            return;
        };
        // Fails with EINVAL when the kernel already dropped the watch
        if let Err(e) = self.inotify.watches().remove(wd) {
            tracing::trace!(%handle, error = %e, "inotify watch already gone");
        }
    }

    fn read_batch(&mut self, wait: bool) -> io::Result<Vec<RawRecord>> {
        let result = if wait {
            self.inotify.read_events_blocking(&mut self.buffer)
        } else {
            self.inotify.read_events(&mut self.buffer)
        };

        let events = match result {
            Ok(events) => events,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::UnexpectedEof
                ) =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        let mut dropped_watches = Vec::new();

        for event in events {
            let kind = decode(event.mask);
            if kind.is_empty() {
                continue;
            }

            let handle = if event.mask.contains(NativeMask::Q_OVERFLOW) {
                None
            } else if let Some(handle) = self.handles.get(&event.wd) {
                Some(*handle)
            } else {
                tracing::trace!(mask = ?event.mask, "record for unknown inotify watch");
                continue;
            };

            if event.mask.contains(NativeMask::IGNORED) {
                dropped_watches.extend(handle);
            }

            records.push(RawRecord {
                handle,
                kind,
                name: event.name.map(ToOwned::to_owned),
                cookie: (event.cookie != 0).then_some(event.cookie),
                is_dir: event.mask.contains(NativeMask::ISDIR),
            });
        }

        for handle in dropped_watches {
            self.forget(handle);
        }

        Ok(records)
    }
}

fn watch_mask(interest: RawKind) -> WatchMask {
    let mut mask = WatchMask::ONLYDIR;
    if interest.contains(RawKind::CREATED) {
        mask |= WatchMask::CREATE;
    }
    if interest.contains(RawKind::REMOVED) {
        mask |= WatchMask::DELETE;
    }
    if interest.contains(RawKind::MODIFIED) {
        mask |= WatchMask::MODIFY;
    }
    if interest.contains(RawKind::RENAMED_FROM) {
        mask |= WatchMask::MOVED_FROM;
    }
    if interest.contains(RawKind::RENAMED_TO) {
        mask |= WatchMask::MOVED_TO;
    }
    if interest.contains(RawKind::SELF_DELETED) {
        mask |= WatchMask::DELETE_SELF;
    }
    mask
}

/// Map native bits onto the shared vocabulary. The kernel's "watch removed"
/// notice is reported as a self-deletion so the registry forgets the watch.
fn decode(mask: NativeMask) -> RawKind {
    let mut kind = RawKind::empty();
    if mask.contains(NativeMask::CREATE) {
        kind |= RawKind::CREATED;
    }
    if mask.contains(NativeMask::DELETE) {
        kind |= RawKind::REMOVED;
    }
    if mask.contains(NativeMask::MODIFY) {
        kind |= RawKind::MODIFIED;
    }
    if mask.contains(NativeMask::MOVED_FROM) {
        kind |= RawKind::RENAMED_FROM;
    }
    if mask.contains(NativeMask::MOVED_TO) {
        kind |= RawKind::RENAMED_TO;
    }
    if mask.intersects(NativeMask::DELETE_SELF | NativeMask::IGNORED) {
        kind |= RawKind::SELF_DELETED;
    }
    if mask.contains(NativeMask::Q_OVERFLOW) {
        kind |= RawKind::QUEUE_OVERFLOWED;
    }
    kind
}
