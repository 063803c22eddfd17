use crate::annotate::model::CanvasState;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Linear undo/redo log: a trimmed sequence of canvas snapshots plus a
/// cursor. Always holds at least the seeded empty state.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHistory {
    states: VecDeque<CanvasState>,
    cursor: usize,
    limit: usize,
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl SnapshotHistory {
    pub fn new(limit: usize) -> Self {
        let mut states = VecDeque::new();
        states.push_back(CanvasState::default());
        Self {
            states,
            cursor: 0,
            limit: limit.max(2),
        }
    }

    /// Appends a snapshot at the cursor. Any redo tail past the cursor is
    /// discarded first; the oldest entries are evicted once the limit is
    /// exceeded.
    pub fn commit(&mut self, state: CanvasState) {
        self.states.truncate(self.cursor + 1);
        self.states.push_back(state);
        self.cursor += 1;
        while self.states.len() > self.limit {
            self.states.pop_front();
            self.cursor -= 1;
        }
    }

    pub fn undo(&mut self) -> Option<CanvasState> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.states[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<CanvasState> {
        if self.cursor + 1 >= self.states.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.states[self.cursor].clone())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.states.len()
    }

    /// Drops everything and reseeds the single empty state. Used when a new
    /// base image is installed; marks drawn against the old image are
    /// meaningless against the new one.
    pub fn reset(&mut self) {
        self.states.clear();
        self.states.push_back(CanvasState::default());
        self.cursor = 0;
    }

    pub fn current(&self) -> &CanvasState {
        &self.states[self.cursor]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
