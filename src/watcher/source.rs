//! Raw notification records and the platform source seam.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;

use bitflags::bitflags;

use super::events::EventMask;

/// Opaque identifier of one directory's registration with an [`EventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(u64);

impl WatchHandle {
    /// Wrap a raw handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Fixed change vocabulary every source adapter maps its native codes onto.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RawKind: u32 {
        const CREATED = 1;
        const REMOVED = 1 << 1;
        const MODIFIED = 1 << 2;
        const RENAMED_FROM = 1 << 3;
        const RENAMED_TO = 1 << 4;
        const SELF_DELETED = 1 << 5;
        const QUEUE_OVERFLOWED = 1 << 6;
    }
}

/// Native interest needed to serve `events`.
///
/// Recursive watches always need structural records so new and removed
/// directories can be tracked, whatever the caller asked to be told about.
#[must_use]
pub fn interest_for(events: EventMask, recursive: bool) -> RawKind {
    let mut kind = RawKind::SELF_DELETED;
    if recursive || events.contains(EventMask::CREATE) {
        kind |= RawKind::CREATED;
    }
    if recursive || events.contains(EventMask::REMOVE) {
        kind |= RawKind::REMOVED;
    }
    if recursive || events.contains(EventMask::MOVE) {
        kind |= RawKind::RENAMED_FROM | RawKind::RENAMED_TO;
    }
    if events.contains(EventMask::MODIFY) {
        kind |= RawKind::MODIFIED;
    }
    kind
}

/// One undecoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Watch the record was reported on; `None` for source-wide records
    /// such as queue overflow.
    pub handle: Option<WatchHandle>,
    pub kind: RawKind,
    /// Entry name relative to the watched directory.
    pub name: Option<OsString>,
    /// Token shared by the two halves of a rename.
    pub cookie: Option<u32>,
    pub is_dir: bool,
}

impl RawRecord {
    /// Record of `kind` on `handle` with no name.
    #[must_use]
    pub const fn new(handle: WatchHandle, kind: RawKind) -> Self {
        Self {
            handle: Some(handle),
            kind,
            name: None,
            cookie: None,
            is_dir: false,
        }
    }

    /// Source-wide overflow record.
    #[must_use]
    pub const fn overflow() -> Self {
        Self {
            handle: None,
            kind: RawKind::QUEUE_OVERFLOWED,
            name: None,
            cookie: None,
            is_dir: false,
        }
    }

    /// Set the entry name.
    #[must_use]
    pub fn named(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the rename token.
    #[must_use]
    pub fn cookie(mut self, cookie: u32) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Mark the record as concerning a directory.
    #[must_use]
    pub fn dir(mut self) -> Self {
        self.is_dir = true;
        self
    }
}

/// Platform notification channel.
///
/// Implementations own the native handle and translate native records into
/// [`RawRecord`]s. A watcher drives its source from one thread at a time.
pub trait EventSource {
    /// Start monitoring the directory at `path`.
    ///
    /// Registering a directory that is already monitored returns its
    /// existing handle.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the directory cannot be watched.
    fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle>;

    /// Stop monitoring `handle`. Unknown handles are ignored.
    fn remove_watch(&mut self, handle: WatchHandle);

    /// Read the next batch of records.
    ///
    /// With `wait` set the call blocks until at least one record is
    /// available; otherwise an empty batch means nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns the OS error if reading fails.
    fn read_batch(&mut self, wait: bool) -> io::Result<Vec<RawRecord>>;
}

#[cfg(test)]
pub(crate) mod scripted {
    //! In-memory source driven by test scripts.

    use std::collections::{HashMap, HashSet, VecDeque};
    use std::path::PathBuf;

    use super::*;

    #[derive(Debug, Default)]
    pub struct ScriptedSource {
        next: u64,
        pub watches: HashMap<WatchHandle, PathBuf>,
        pub refuse: HashSet<PathBuf>,
        pub removed: Vec<WatchHandle>,
        batches: VecDeque<Vec<RawRecord>>,
        pub reads: Vec<bool>,
    }

    impl ScriptedSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_batch(&mut self, batch: Vec<RawRecord>) {
            self.batches.push_back(batch);
        }

        pub fn handle_of(&self, path: &Path) -> Option<WatchHandle> {
            self.watches
                .iter()
                .find_map(|(h, p)| (p == path).then_some(*h))
        }

        pub fn pending_batches(&self) -> usize {
            self.batches.len()
        }
    }

    impl EventSource for ScriptedSource {
        fn add_watch(&mut self, path: &Path) -> io::Result<WatchHandle> {
            if self.refuse.contains(path) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "permission denied",
                ));
            }
            if let Some(existing) = self.handle_of(path) {
                return Ok(existing);
            }
            self.next += 1;
            let handle = WatchHandle::new(self.next);
            self.watches.insert(handle, path.to_path_buf());
            Ok(handle)
        }

        fn remove_watch(&mut self, handle: WatchHandle) {
            if self.watches.remove(&handle).is_some() {
                self.removed.push(handle);
            }
        }

        fn read_batch(&mut self, wait: bool) -> io::Result<Vec<RawRecord>> {
            self.reads.push(wait);
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_recursive_always_structural() {
        let kind = interest_for(EventMask::MODIFY, true);
        assert!(kind.contains(
            RawKind::CREATED
                | RawKind::REMOVED
                | RawKind::RENAMED_FROM
                | RawKind::RENAMED_TO
                | RawKind::SELF_DELETED
                | RawKind::MODIFIED
        ));
    }

    #[test]
    fn test_interest_flat_follows_mask() {
        let kind = interest_for(EventMask::CREATE, false);
        assert_eq!(kind, RawKind::CREATED | RawKind::SELF_DELETED);

        let kind = interest_for(EventMask::MOVE | EventMask::REMOVE, false);
        assert!(kind.contains(RawKind::RENAMED_FROM | RawKind::RENAMED_TO));
        assert!(kind.contains(RawKind::REMOVED));
        assert!(!kind.contains(RawKind::CREATED));
        assert!(!kind.contains(RawKind::MODIFIED));
    }

    #[test]
    fn test_record_builders() {
        let record = RawRecord::new(WatchHandle::new(3), RawKind::RENAMED_FROM)
            .named("a.txt")
            .cookie(42)
            .dir();
        assert_eq!(record.handle, Some(WatchHandle::new(3)));
        assert_eq!(record.name.as_deref(), Some(std::ffi::OsStr::new("a.txt")));
        assert_eq!(record.cookie, Some(42));
        assert!(record.is_dir);

        let overflow = RawRecord::overflow();
        assert!(overflow.handle.is_none());
        assert!(overflow.kind.contains(RawKind::QUEUE_OVERFLOWED));
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(WatchHandle::new(7).to_string(), "#7");
        assert_eq!(WatchHandle::new(7).get(), 7);
    }
}
