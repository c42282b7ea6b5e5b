//! History Manager — bounded snapshot stacks for undo/redo.
//!
//! DESIGN
//! ======
//! Every structural mutation pushes a full [`SceneTree`] snapshot (not a
//! diff). Full serialization is O(scene size) per edit, which is acceptable
//! at editor-canvas scale and keeps restore trivially correct. Two stacks:
//! `undo` bounded to a configured limit with oldest-first eviction, `redo`
//! cleared by every push.
//!
//! The stacks only move entries; the editor owns the restore. The commit
//! methods run AFTER a successful restore, so a failed restore leaves both
//! stacks exactly as they were (operation abandoned, never partially
//! applied).

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::object::SceneTree;

pub const DEFAULT_HISTORY_LIMIT: usize = 80;

/// Bounded undo/redo stacks over full-scene snapshots.
pub struct History {
    undo: VecDeque<SceneTree>,
    redo: Vec<SceneTree>,
    limit: usize,
}

impl History {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), limit: limit.max(1) }
    }

    /// Record a post-mutation snapshot. Evicts the oldest entry when over the
    /// limit and invalidates the redo stack — any new mutation forks history.
    pub fn push(&mut self, snapshot: SceneTree) {
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
        self.redo.clear();
    }

    /// The snapshot an undo would restore: the entry beneath the top (which
    /// captured the current state), or an empty scene when only the top
    /// remains. `None` when there is nothing to undo.
    #[must_use]
    pub fn undo_target(&self) -> Option<SceneTree> {
        if self.undo.is_empty() {
            return None;
        }
        if self.undo.len() == 1 {
            return Some(SceneTree::default());
        }
        self.undo.get(self.undo.len() - 2).cloned()
    }

    /// Commit a successful undo restore: the top entry (the state just left)
    /// moves onto the redo stack. Call only after the restore succeeded.
    pub fn commit_undo(&mut self) {
        if let Some(top) = self.undo.pop_back() {
            self.redo.push(top);
        }
    }

    /// The snapshot a redo would restore. `None` when the redo stack is empty.
    #[must_use]
    pub fn redo_target(&self) -> Option<SceneTree> {
        self.redo.last().cloned()
    }

    /// Commit a successful redo restore: the entry moves back onto undo.
    /// Call only after the restore succeeded.
    pub fn commit_redo(&mut self) {
        if let Some(entry) = self.redo.pop() {
            // Re-entering via redo never exceeds the limit: the entry was
            // popped from this same bounded deque.
            if self.undo.len() == self.limit {
                self.undo.pop_front();
            }
            self.undo.push_back(entry);
        }
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Snapshots currently on the undo stack, oldest first.
    #[must_use]
    pub fn undo_entries(&self) -> impl Iterator<Item = &SceneTree> {
        self.undo.iter()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
