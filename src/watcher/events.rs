//! Normalized file system event types and the handler seam.

#![allow(clippy::missing_const_for_fn)]

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// Event kinds a watcher delivers to its handler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        /// A file or directory appeared.
        const CREATE = 1;
        /// A file or directory was removed.
        const REMOVE = 1 << 1;
        /// File contents changed.
        const MODIFY = 1 << 2;
        /// A file or directory was moved.
        const MOVE = 1 << 3;
        /// Every combinable kind.
        const ALL = Self::CREATE.bits() | Self::REMOVE.bits() | Self::MODIFY.bits() | Self::MOVE.bits();
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Kind of a normalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Remove,
    Modify,
    Move,
    /// Records were dropped by the notification source. Not part of
    /// [`EventMask`]; always delivered.
    Overflow,
}

impl EventKind {
    /// Mask bit selecting this kind, `None` for [`EventKind::Overflow`].
    #[must_use]
    pub fn mask(self) -> Option<EventMask> {
        match self {
            Self::Create => Some(EventMask::CREATE),
            Self::Remove => Some(EventMask::REMOVE),
            Self::Modify => Some(EventMask::MODIFY),
            Self::Move => Some(EventMask::MOVE),
            Self::Overflow => None,
        }
    }

    /// Whether a watcher configured with `mask` delivers this kind.
    #[must_use]
    pub fn selected_by(self, mask: EventMask) -> bool {
        self.mask().map_or(true, |bit| mask.contains(bit))
    }
}

/// A normalized event, valid only for the duration of one handler call.
///
/// A `Move` always has at least one endpoint: `from` is `None` when the file
/// arrived from outside the watched tree, `to` is `None` when it left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    Create(&'a Path),
    Remove(&'a Path),
    Modify(&'a Path),
    Move {
        from: Option<&'a Path>,
        to: Option<&'a Path>,
    },
    Overflow,
}

impl<'a> Event<'a> {
    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Create(_) => EventKind::Create,
            Self::Remove(_) => EventKind::Remove,
            Self::Modify(_) => EventKind::Modify,
            Self::Move { .. } => EventKind::Move,
            Self::Overflow => EventKind::Overflow,
        }
    }

    /// Source path: the affected path, or where a move started.
    #[must_use]
    pub fn src(&self) -> Option<&'a Path> {
        match *self {
            Self::Create(p) | Self::Remove(p) | Self::Modify(p) => Some(p),
            Self::Move { from, .. } => from,
            Self::Overflow => None,
        }
    }

    /// Destination path of a move.
    #[must_use]
    pub fn dst(&self) -> Option<&'a Path> {
        match *self {
            Self::Move { to, .. } => to,
            _ => None,
        }
    }
}

/// Owned copy of an [`Event`] for callers that keep events past dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum FileEvent {
    Create { path: PathBuf },
    Remove { path: PathBuf },
    Modify { path: PathBuf },
    Move {
        from: Option<PathBuf>,
        to: Option<PathBuf>,
    },
    Overflow,
}

impl FileEvent {
    /// Kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Create { .. } => EventKind::Create,
            Self::Remove { .. } => EventKind::Remove,
            Self::Modify { .. } => EventKind::Modify,
            Self::Move { .. } => EventKind::Move,
            Self::Overflow => EventKind::Overflow,
        }
    }
}

impl From<Event<'_>> for FileEvent {
    fn from(event: Event<'_>) -> Self {
        match event {
            Event::Create(p) => Self::Create { path: p.into() },
            Event::Remove(p) => Self::Remove { path: p.into() },
            Event::Modify(p) => Self::Modify { path: p.into() },
            Event::Move { from, to } => Self::Move {
                from: from.map(Path::to_path_buf),
                to: to.map(Path::to_path_buf),
            },
            Event::Overflow => Self::Overflow,
        }
    }
}

/// Receives normalized events from [`Watcher::poll`](super::Watcher::poll).
///
/// Returning `ControlFlow::Break(())` ends the current poll immediately.
/// Records already read but not yet dispatched are discarded, not requeued.
pub trait EventHandler {
    /// Handle one event.
    fn handle(&mut self, event: Event<'_>) -> ControlFlow<()>;
}

impl<F> EventHandler for F
where
    F: FnMut(Event<'_>) -> ControlFlow<()>,
{
    fn handle(&mut self, event: Event<'_>) -> ControlFlow<()> {
        self(event)
    }
}
