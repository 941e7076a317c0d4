//! Bounded undo/redo journal.
//!
//! Every undoable command records one entry: the forward action it applied
//! plus an exact inverse captured and journaled under the same write lock
//! as the application. Undo applies the inverse through the normal reducer
//! pipeline, so undo bumps the version counter like any other mutation.
//!
//! The journal is bounded per slice; recording past the bound evicts the
//! oldest entry of that slice. Any new undoable command clears the redo
//! stack.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::command::CorrelationId;
use crate::store::{SliceId, StateAction};

/// One recorded undoable mutation.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub slice: SliceId,
    /// Restores the slice to its pre-command contents.
    pub inverse: StateAction,
    /// Re-applies the command's mutation (for redo).
    pub forward: StateAction,
    /// Correlation id of the command that recorded this entry.
    pub correlation_id: CorrelationId,
}

struct JournalInner {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
}

/// Session-scoped undo/redo journal. All methods are synchronous and take
/// `&self`; internal state is behind a mutex.
pub struct UndoJournal {
    inner: Mutex<JournalInner>,
    depth: usize,
}

impl UndoJournal {
    pub fn new(depth: usize) -> Self {
        Self {
            inner: Mutex::new(JournalInner {
                undo: VecDeque::new(),
                redo: Vec::new(),
            }),
            depth,
        }
    }

    /// Record a new undoable mutation. Clears the redo stack and evicts the
    /// oldest entry of the same slice when the per-slice bound is exceeded.
    pub fn record(&self, entry: UndoEntry) {
        let mut inner = self.inner.lock().expect("undo journal lock poisoned");
        inner.redo.clear();
        let slice = entry.slice;
        inner.undo.push_back(entry);
        let in_slice = inner
            .undo
            .iter()
            .filter(|entry| entry.slice == slice)
            .count();
        if in_slice > self.depth {
            if let Some(oldest) = inner.undo.iter().position(|entry| entry.slice == slice) {
                inner.undo.remove(oldest);
            }
        }
    }

    /// Pop the most recent entry for undo; the entry moves to the redo
    /// stack. Returns `None` when there is nothing to undo.
    pub fn pop_for_undo(&self) -> Option<UndoEntry> {
        let mut inner = self.inner.lock().expect("undo journal lock poisoned");
        let entry = inner.undo.pop_back()?;
        inner.redo.push(entry.clone());
        Some(entry)
    }

    /// Pop the most recent undone entry for redo; the entry moves back to
    /// the undo stack without clearing the rest of the redo stack.
    pub fn pop_for_redo(&self) -> Option<UndoEntry> {
        let mut inner = self.inner.lock().expect("undo journal lock poisoned");
        let entry = inner.redo.pop()?;
        inner.undo.push_back(entry.clone());
        Some(entry)
    }

    /// Drop all history (initialize, reset, delete).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("undo journal lock poisoned");
        inner.undo.clear();
        inner.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self
            .inner
            .lock()
            .expect("undo journal lock poisoned")
            .undo
            .is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self
            .inner
            .lock()
            .expect("undo journal lock poisoned")
            .redo
            .is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.inner
            .lock()
            .expect("undo journal lock poisoned")
            .undo
            .len()
    }
}
