//! Reconstruction of moves from two-part rename notifications.
//!
//! A rename arrives as a departure (`RenamedFrom`) and an arrival
//! (`RenamedTo`) sharing a correlation token. Sources usually deliver the two
//! back to back, but only one half is visible when the other endpoint is
//! outside the watched tree, so every combination has a defined outcome:
//!
//! | state      | record                   | emitted                              | next state |
//! |------------|--------------------------|--------------------------------------|------------|
//! | idle       | departure                | nothing                              | pending    |
//! | pending    | departure                | `Move(src, none)` for the old one    | pending    |
//! | pending    | arrival, same token      | `Move(src, dst)`                     | idle       |
//! | pending    | arrival, other token     | `Move(src, none)`, `Move(none, dst)` | idle       |
//! | idle       | arrival                  | `Move(none, dst)`                    | idle       |
//! | pending    | end of poll              | `Move(src, none)`                    | idle       |
//!
//! Tokens compare as options: two halves that both lack a token pair by
//! adjacency alone.

/// A reconstructed move. At least one endpoint is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved<P> {
    pub from: Option<P>,
    pub to: Option<P>,
    pub is_dir: bool,
}

impl<P> Moved<P> {
    fn departed(from: P, is_dir: bool) -> Self {
        Self {
            from: Some(from),
            to: None,
            is_dir,
        }
    }

    fn arrived(to: P, is_dir: bool) -> Self {
        Self {
            from: None,
            to: Some(to),
            is_dir,
        }
    }
}

#[derive(Debug)]
struct PendingMove<P> {
    source: P,
    token: Option<u32>,
    is_dir: bool,
}

/// Per-poll pairing state. Holds at most one unmatched departure.
#[derive(Debug)]
pub struct MovePairing<P> {
    pending: Option<PendingMove<P>>,
}

impl<P> Default for MovePairing<P> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<P> MovePairing<P> {
    /// Start idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a departure is waiting for its arrival.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed a departure. Returns the previous unmatched departure, which
    /// can no longer be paired and left the tree.
    pub fn depart(&mut self, source: P, token: Option<u32>, is_dir: bool) -> Option<Moved<P>> {
        let flushed = self.flush();
        self.pending = Some(PendingMove {
            source,
            token,
            is_dir,
        });
        flushed
    }

    /// Feed an arrival. Yields one move when it completes the pending
    /// departure, otherwise the flushed departure (if any) followed by an
    /// arrival from outside the tree.
    pub fn arrive(
        &mut self,
        dest: P,
        token: Option<u32>,
        is_dir: bool,
    ) -> impl Iterator<Item = Moved<P>> {
        let (flushed, current) = match self.pending.take() {
            Some(pending) if pending.token == token => (
                None,
                Moved {
                    from: Some(pending.source),
                    to: Some(dest),
                    is_dir: pending.is_dir || is_dir,
                },
            ),
            Some(pending) => (
                Some(Moved::departed(pending.source, pending.is_dir)),
                Moved::arrived(dest, is_dir),
            ),
            None => (None, Moved::arrived(dest, is_dir)),
        };
        flushed.into_iter().chain(std::iter::once(current))
    }

    /// End of poll: an unmatched departure left the tree.
    pub fn finish(&mut self) -> Option<Moved<P>> {
        self.flush()
    }

    fn flush(&mut self) -> Option<Moved<P>> {
        self.pending
            .take()
            .map(|pending| Moved::departed(pending.source, pending.is_dir))
    }
}
