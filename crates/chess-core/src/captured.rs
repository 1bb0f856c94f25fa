use serde::Serialize;
use shakmaty::{Color, Role};

use crate::position_log::MoveRecord;

/// Pieces taken so far, keyed by the side that made the capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapturedPieces {
    /// Black pieces captured by White, as role letters ("p", "n", ...)
    pub white: Vec<char>,
    /// White pieces captured by Black
    pub black: Vec<char>,
}

impl CapturedPieces {
    pub fn record(&mut self, mover: Color, role: Role) {
        match mover {
            Color::White => self.white.push(role.char()),
            Color::Black => self.black.push(role.char()),
        }
    }

    /// Rebuild from a move list, used after a branch discards moves.
    pub fn replay(moves: &[MoveRecord]) -> Self {
        let mut captured = Self::default();
        for m in moves {
            if let Some(role) = m.captured {
                captured.record(m.color, role);
            }
        }
        captured
    }

    pub fn clear(&mut self) {
        self.white.clear();
        self.black.clear();
    }
}
