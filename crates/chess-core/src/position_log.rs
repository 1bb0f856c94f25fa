//! Move/position history with a time-travel cursor.
//!
//! Snapshot 0 is the starting position; snapshot `i + 1` is the position after
//! move `i`. The cursor is the index of the last visible move, `None` when the
//! starting position is shown. Appending behind the tip truncates the future:
//! history is overwritten, never forked.

use shakmaty::{Color, Role};

/// A serialized board state produced by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub fen: String,
    pub turn: Color,
}

/// One applied move as it appears in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Human-readable SAN
    pub notation: String,
    pub uci: String,
    pub color: Color,
    pub captured: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct PositionLog {
    snapshots: Vec<Snapshot>,
    moves: Vec<MoveRecord>,
    cursor: Option<usize>,
}

impl PositionLog {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            snapshots: vec![initial],
            moves: Vec::new(),
            cursor: None,
        }
    }

    /// Record a move made from the current cursor position.
    ///
    /// Returns true when moves past the cursor had to be discarded first.
    pub fn append(&mut self, record: MoveRecord, position: Snapshot) -> bool {
        let keep = self.visible_len();
        let truncated = keep < self.moves.len();
        if truncated {
            self.moves.truncate(keep);
            self.snapshots.truncate(keep + 1);
        }

        self.moves.push(record);
        self.snapshots.push(position);
        self.cursor = Some(self.moves.len() - 1);
        truncated
    }

    /// Move the cursor. `None` is the starting position. Out-of-range indices
    /// leave everything untouched and return `None`.
    pub fn rewind_to(&mut self, index: Option<usize>) -> Option<&Snapshot> {
        if let Some(i) = index {
            if i >= self.moves.len() {
                return None;
            }
        }
        self.cursor = index;
        Some(self.current())
    }

    pub fn reset(&mut self, initial: Snapshot) {
        self.snapshots.clear();
        self.snapshots.push(initial);
        self.moves.clear();
        self.cursor = None;
    }

    /// Snapshot visible through the cursor.
    pub fn current(&self) -> &Snapshot {
        &self.snapshots[self.visible_len()]
    }

    pub fn initial(&self) -> &Snapshot {
        &self.snapshots[0]
    }

    pub fn snapshot(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_at_tip(&self) -> bool {
        self.visible_len() == self.moves.len()
    }

    /// Number of moves applied to reach the visible snapshot.
    fn visible_len(&self) -> usize {
        self.cursor.map_or(0, |i| i + 1)
    }
}
