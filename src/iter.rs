use std::cell::Cell;
use std::iter::FusedIterator;
use std::rc::{Rc, Weak};
use std::vec;

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterState {
    /// Values remain and the source set has not changed.
    Active,
    /// Every value has been handed out; the source set has not changed.
    Exhausted,
    /// The source set was mutated after the snapshot was taken. Terminal.
    Invalidated,
}

/// A one-shot, ascending copy of a set's contents that refuses to continue once the set it came
/// from has been structurally modified.
///
/// The snapshot owns its values and reads nothing from the set after creation; the only link back
/// is a shared flag the set raises on its next `insert` or `clear`.
#[derive(Debug)]
pub struct SnapshotIter<T> {
    values: vec::IntoIter<T>,
    len: usize,
    invalidated: Rc<Cell<bool>>,
    finished: bool,
}

impl<T> SnapshotIter<T> {
    /// Position of the next value to be handed out.
    pub fn cursor(&self) -> usize {
        self.len - self.values.len()
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Whether a value remains at the cursor. This does not consult the invalidation flag; a
    /// snapshot can have values left and still refuse to hand them out.
    pub fn has_next(&self) -> bool {
        self.values.len() > 0
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.get()
    }

    pub fn state(&self) -> IterState {
        if self.is_invalidated() {
            IterState::Invalidated
        } else if self.has_next() {
            IterState::Active
        } else {
            IterState::Exhausted
        }
    }

    pub fn try_next(&mut self) -> Result<T> {
        if self.is_invalidated() {
            return Err(Error::StructuralChange);
        }
        self.values.next().ok_or(Error::Exhausted)
    }
}

/// Yields `Ok` for each value, then ends. If the source set changed, a single
/// `Err(StructuralChange)` is yielded in place of the next value and the iterator ends there.
impl<T> Iterator for SnapshotIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.try_next() {
            Ok(value) => Some(Ok(value)),
            Err(Error::Exhausted) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else if self.is_invalidated() {
            (1, Some(1))
        } else {
            (self.remaining(), Some(self.remaining()))
        }
    }
}

impl<T> FusedIterator for SnapshotIter<T> {}

/// Non-owning handles to every snapshot a set has handed out that might still be listening.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    handles: Vec<Weak<Cell<bool>>>,
}

impl Registry {
    pub fn register<T>(&mut self, snapshot: Vec<T>) -> SnapshotIter<T> {
        // Snapshots that were dropped no longer need a signal.
        self.handles.retain(|handle| handle.strong_count() > 0);
        let invalidated = Rc::new(Cell::new(false));
        self.handles.push(Rc::downgrade(&invalidated));
        SnapshotIter {
            len: snapshot.len(),
            values: snapshot.into_iter(),
            invalidated,
            finished: false,
        }
    }

    /// Raise the flag on every live snapshot. Invalidation is permanent, so the handles are
    /// dropped afterwards.
    pub fn invalidate_all(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let mut notified = 0usize;
        for flag in self.handles.drain(..).filter_map(|handle| handle.upgrade()) {
            flag.set(true);
            notified += 1;
        }
        log::trace!("invalidated {notified} live snapshot(s)");
    }

    pub fn live(&self) -> usize {
        self.handles
            .iter()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }
}
