/// Playability check run on a puzzle before it is offered

use chess_core::{GameSession, RulesEngine, RulesError};
use thiserror::Error;

use crate::puzzle::Puzzle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PuzzleDefect {
    #[error("start position rejected: {0}")]
    StartPosition(#[from] RulesError),

    #[error("start position is already checkmate or stalemate")]
    AlreadyDecided,

    #[error("solution line is empty")]
    EmptySolution,

    #[error("solution line has no ply for the solving side")]
    NothingToSolve,

    #[error("ply {index} ({ply}) is illegal")]
    IllegalPly { index: usize, ply: String },
}

/// Replay the whole solution line on a scratch session.
pub fn check<R: RulesEngine + Default>(puzzle: &Puzzle) -> Result<(), PuzzleDefect> {
    let mut scratch = GameSession::<R>::from_fen(&puzzle.fen)?;

    let status = scratch.status();
    if status.is_checkmate || status.is_stalemate {
        return Err(PuzzleDefect::AlreadyDecided);
    }
    if puzzle.moves.is_empty() {
        return Err(PuzzleDefect::EmptySolution);
    }
    if puzzle.solver_moves().is_empty() {
        return Err(PuzzleDefect::NothingToSolve);
    }

    for (index, ply) in puzzle.moves.iter().enumerate() {
        if scratch.apply_uci(ply).is_none() {
            return Err(PuzzleDefect::IllegalPly {
                index,
                ply: ply.clone(),
            });
        }
    }
    Ok(())
}
