//! Rules-engine seam. Sessions never generate moves themselves; they ask a
//! [`RulesEngine`] for legality, notation and terminal state.

use std::collections::HashMap;

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};
use thiserror::Error;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Half-move clock value at which the fifty-move rule applies.
const FIFTY_MOVE_PLIES: u32 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Illegal position: {0}")]
    IllegalPosition(String),

    #[error("Recorded move no longer plays: {0}")]
    ReplayFailed(String),
}

/// A move the rules engine accepted and executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// SAN with check/mate suffix, e.g. "Qxf7#"
    pub san: String,
    /// Coordinate notation, e.g. "h5f7" or "e7e8q"
    pub uci: String,
    /// Side that made the move
    pub color: Color,
    /// Role of the captured piece, if any
    pub captured: Option<Role>,
}

/// A legal move in coordinate form (castling as king source/destination).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegalMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

/// Capability interface of a chess rules engine.
///
/// Any compliant implementation can back a [`GameSession`](crate::session::GameSession).
pub trait RulesEngine {
    /// Replace the current position with `fen`. On error the position is unchanged.
    fn load(&mut self, fen: &str) -> Result<(), RulesError>;

    /// Execute a move if it is legal. `None` means rejected, not a fault.
    fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> Option<AppliedMove>;

    /// Legal moves in the current position, optionally only those leaving `from`.
    fn legal_moves(&self, from: Option<Square>) -> Vec<LegalMove>;

    fn side_to_move(&self) -> Color;

    fn is_check(&self) -> bool;

    fn is_checkmate(&self) -> bool;

    fn is_stalemate(&self) -> bool;

    fn is_threefold_repetition(&self) -> bool;

    fn is_insufficient_material(&self) -> bool;

    fn is_draw(&self) -> bool;

    /// Current position as FEN.
    fn current_position(&self) -> String;

    fn is_legal(&self, from: Square, to: Square) -> bool {
        self.legal_moves(Some(from)).iter().any(|m| m.to == to)
    }
}

/// [`RulesEngine`] backed by shakmaty.
///
/// Repetition counts only cover positions reached since the last `load`,
/// because a FEN carries no history.
#[derive(Debug, Clone)]
pub struct ShakmatyRules {
    pos: Chess,
    repetitions: HashMap<String, u32>,
}

impl Default for ShakmatyRules {
    fn default() -> Self {
        let mut rules = Self {
            pos: Chess::default(),
            repetitions: HashMap::new(),
        };
        rules.count_repetition();
        rules
    }
}

impl ShakmatyRules {
    pub fn position(&self) -> &Chess {
        &self.pos
    }

    fn count_repetition(&mut self) {
        *self.repetitions.entry(repetition_key(&self.pos)).or_insert(0) += 1;
    }

    /// Resolve from/to into a legal shakmaty move. A missing promotion on a
    /// pawn reaching the last rank is taken as a queen.
    fn find_move(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        [promotion, promotion.or(Some(Role::Queen))]
            .iter()
            .find_map(|promo| {
                UciMove::Normal {
                    from,
                    to,
                    promotion: *promo,
                }
                .to_move(&self.pos)
                .ok()
            })
    }
}

impl RulesEngine for ShakmatyRules {
    fn load(&mut self, fen: &str) -> Result<(), RulesError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e: shakmaty::fen::ParseFenError| RulesError::InvalidFen(e.to_string()))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::IllegalPosition(e.to_string()))?;

        self.pos = pos;
        self.repetitions.clear();
        self.count_repetition();
        Ok(())
    }

    fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> Option<AppliedMove> {
        let mv = self.find_move(from, to, promotion)?;

        let color = self.pos.turn();
        let captured = mv.capture();
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let san = San::from_move(&self.pos, mv).to_string();

        self.pos.play_unchecked(mv);
        self.count_repetition();

        let suffix = if self.pos.is_checkmate() {
            "#"
        } else if self.pos.is_check() {
            "+"
        } else {
            ""
        };

        Some(AppliedMove {
            san: format!("{san}{suffix}"),
            uci,
            color,
            captured,
        })
    }

    fn legal_moves(&self, from: Option<Square>) -> Vec<LegalMove> {
        self.pos
            .legal_moves()
            .iter()
            .filter_map(|m| match m.to_uci(CastlingMode::Standard) {
                UciMove::Normal {
                    from: f,
                    to,
                    promotion,
                } => Some(LegalMove {
                    from: f,
                    to,
                    promotion,
                }),
                _ => None,
            })
            .filter(|m| from.map_or(true, |sq| m.from == sq))
            .collect()
    }

    fn side_to_move(&self) -> Color {
        self.pos.turn()
    }

    fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    fn is_checkmate(&self) -> bool {
        self.pos.is_checkmate()
    }

    fn is_stalemate(&self) -> bool {
        self.pos.is_stalemate()
    }

    fn is_threefold_repetition(&self) -> bool {
        self.repetitions
            .get(&repetition_key(&self.pos))
            .is_some_and(|count| *count >= 3)
    }

    fn is_insufficient_material(&self) -> bool {
        self.pos.is_insufficient_material()
    }

    fn is_draw(&self) -> bool {
        self.is_stalemate()
            || self.is_insufficient_material()
            || self.is_threefold_repetition()
            || self.pos.halfmoves() >= FIFTY_MOVE_PLIES
    }

    fn current_position(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }
}

/// Placement, side to move, castling rights and en passant square; the move
/// counters are dropped so identical positions compare equal.
fn repetition_key(pos: &Chess) -> String {
    let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Parse a coordinate move ("e2e4", "e7e8q") into from/to/promotion.
pub fn parse_uci(ply: &str) -> Option<(Square, Square, Option<Role>)> {
    match ply.trim().to_ascii_lowercase().parse::<UciMove>().ok()? {
        UciMove::Normal {
            from,
            to,
            promotion,
        } => Some((from, to, promotion)),
        _ => None,
    }
}

/// "w" / "b", the FEN spelling of a side.
pub fn color_code(color: Color) -> &'static str {
    match color {
        Color::White => "w",
        Color::Black => "b",
    }
}
