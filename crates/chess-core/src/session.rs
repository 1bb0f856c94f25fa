//! A playable game: rules engine + position log + captured pieces.

use shakmaty::{Color, Role, Square};
use tracing::{debug, error};

use crate::captured::CapturedPieces;
use crate::position_log::{MoveRecord, PositionLog, Snapshot};
use crate::rules::{parse_uci, LegalMove, RulesEngine, RulesError, ShakmatyRules, STANDARD_START_FEN};

/// Read-only view of a session, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStatus {
    pub fen: String,
    pub side_to_move: Color,
    pub in_check: bool,
    pub is_checkmate: bool,
    pub is_draw: bool,
    pub is_stalemate: bool,
    pub is_threefold_repetition: bool,
    pub is_insufficient_material: bool,
    pub is_game_over: bool,
    pub move_history: Vec<MoveRecord>,
    pub captured: CapturedPieces,
    /// Index of the last visible move; `None` at the starting position
    pub current_move_index: Option<usize>,
}

/// Where to move the history cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Start,
    Previous,
    Next,
    End,
    Move(usize),
}

/// Handle for the one outstanding opponent-suggestion request of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionTicket {
    id: u64,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionDelivery {
    Applied(MoveRecord),
    /// Superseded by a newer request, or the position changed meanwhile
    Stale,
    /// The suggested move is not legal here
    Illegal,
}

pub struct GameSession<R = ShakmatyRules> {
    rules: R,
    log: PositionLog,
    captured: CapturedPieces,
    /// Bumped on every change of the visible position
    generation: u64,
    next_ticket: u64,
    pending_suggestion: Option<SuggestionTicket>,
}

impl<R: RulesEngine + Default> Default for GameSession<R> {
    fn default() -> Self {
        Self::with_rules(R::default())
    }
}

impl<R: RulesEngine + Default> GameSession<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let mut session = Self::new();
        session.load_position(fen)?;
        Ok(session)
    }
}

impl<R: RulesEngine> GameSession<R> {
    pub fn with_rules(rules: R) -> Self {
        let initial = Snapshot {
            fen: rules.current_position(),
            turn: rules.side_to_move(),
        };
        Self {
            rules,
            log: PositionLog::new(initial),
            captured: CapturedPieces::default(),
            generation: 0,
            next_ticket: 0,
            pending_suggestion: None,
        }
    }

    /// Try a move from the visible position. `None` if the rules engine rejects it.
    ///
    /// Playing from a rewound position discards the moves after it.
    pub fn apply_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Role>,
    ) -> Option<MoveRecord> {
        let applied = self.rules.apply_move(from, to, promotion)?;
        let record = MoveRecord {
            notation: applied.san,
            uci: applied.uci,
            color: applied.color,
            captured: applied.captured,
        };

        let snapshot = self.snapshot_now();
        if self.log.append(record.clone(), snapshot) {
            self.captured = CapturedPieces::replay(self.log.moves());
        } else if let Some(role) = record.captured {
            self.captured.record(record.color, role);
        }

        self.touch();
        debug!(san = %record.notation, uci = %record.uci, "move applied");
        Some(record)
    }

    /// Apply a move given in coordinate notation ("e2e4", "e7e8q").
    pub fn apply_uci(&mut self, ply: &str) -> Option<MoveRecord> {
        let (from, to, promotion) = parse_uci(ply)?;
        self.apply_move(from, to, promotion)
    }

    /// Discard all history and start over from `fen`. On error nothing changes.
    pub fn load_position(&mut self, fen: &str) -> Result<(), RulesError> {
        self.rules.load(fen)?;
        let initial = self.snapshot_now();
        self.log.reset(initial);
        self.captured.clear();
        self.touch();
        Ok(())
    }

    /// Back to the standard starting position.
    pub fn reset(&mut self) {
        if let Err(e) = self.load_position(STANDARD_START_FEN) {
            error!(error = %e, "rules engine rejected the standard start position");
        }
    }

    pub fn status(&self) -> GameStatus {
        let is_checkmate = self.rules.is_checkmate();
        let is_draw = self.rules.is_draw();
        GameStatus {
            fen: self.rules.current_position(),
            side_to_move: self.rules.side_to_move(),
            in_check: self.rules.is_check(),
            is_checkmate,
            is_draw,
            is_stalemate: self.rules.is_stalemate(),
            is_threefold_repetition: self.rules.is_threefold_repetition(),
            is_insufficient_material: self.rules.is_insufficient_material(),
            is_game_over: is_checkmate || is_draw,
            move_history: self.log.moves().to_vec(),
            captured: self.captured.clone(),
            current_move_index: self.log.current_index(),
        }
    }

    pub fn navigate(&mut self, target: Navigation) -> bool {
        match target {
            Navigation::Start => self.go_to_move(None),
            Navigation::Previous => self.go_to_previous(),
            Navigation::Next => self.go_to_next(),
            Navigation::End => match self.log.moves().len() {
                0 => self.go_to_move(None),
                n => self.go_to_move(Some(n - 1)),
            },
            Navigation::Move(i) => self.go_to_move(Some(i)),
        }
    }

    pub fn go_to_previous(&mut self) -> bool {
        match self.log.current_index() {
            None => false,
            Some(0) => self.go_to_move(None),
            Some(i) => self.go_to_move(Some(i - 1)),
        }
    }

    pub fn go_to_next(&mut self) -> bool {
        let next = self.log.current_index().map_or(0, |i| i + 1);
        self.go_to_move(Some(next))
    }

    /// Show the position after move `index` (`None` = starting position).
    pub fn go_to_move(&mut self, index: Option<usize>) -> bool {
        let previous = self.log.current_index();
        if self.log.rewind_to(index).is_none() {
            return false;
        }

        if let Err(e) = self.replay_to(index) {
            error!(error = %e, "recorded history failed to replay");
            self.log.rewind_to(previous);
            if let Err(e) = self.replay_to(previous) {
                error!(error = %e, "could not restore the previous position");
            }
            return false;
        }

        self.touch();
        true
    }

    pub fn is_legal_move(&self, from: Square, to: Square) -> bool {
        self.rules.is_legal(from, to)
    }

    pub fn legal_moves(&self, from: Option<Square>) -> Vec<LegalMove> {
        self.rules.legal_moves(from)
    }

    pub fn side_to_move(&self) -> Color {
        self.rules.side_to_move()
    }

    pub fn fen(&self) -> String {
        self.rules.current_position()
    }

    pub fn is_at_tip(&self) -> bool {
        self.log.is_at_tip()
    }

    pub fn history(&self) -> &[MoveRecord] {
        self.log.moves()
    }

    pub fn log(&self) -> &PositionLog {
        &self.log
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start an opponent-suggestion request. Any outstanding request is
    /// superseded and its reply will be discarded.
    pub fn request_suggestion(&mut self) -> SuggestionTicket {
        self.next_ticket += 1;
        let ticket = SuggestionTicket {
            id: self.next_ticket,
            generation: self.generation,
        };
        if let Some(old) = self.pending_suggestion.replace(ticket) {
            debug!(superseded = old.id, ticket = ticket.id, "suggestion request superseded");
        }
        ticket
    }

    /// Apply a suggested move if `ticket` is still the outstanding request and
    /// the position has not changed since it was issued.
    pub fn deliver_suggestion(&mut self, ticket: SuggestionTicket, uci: &str) -> SuggestionDelivery {
        if self.pending_suggestion != Some(ticket) || ticket.generation != self.generation {
            debug!(ticket = ticket.id, "discarding stale suggestion");
            return SuggestionDelivery::Stale;
        }
        self.pending_suggestion = None;

        match self.apply_uci(uci) {
            Some(record) => SuggestionDelivery::Applied(record),
            None => SuggestionDelivery::Illegal,
        }
    }

    pub fn has_pending_suggestion(&self) -> bool {
        self.pending_suggestion.is_some()
    }

    /// Reload the starting position and replay the recorded moves up to
    /// `index`, so repetition counts match the game actually played.
    fn replay_to(&mut self, index: Option<usize>) -> Result<(), RulesError> {
        let initial = self.log.initial().fen.clone();
        self.rules.load(&initial)?;

        let upto = index.map_or(0, |i| i + 1);
        for record in &self.log.moves()[..upto] {
            let replayed = parse_uci(&record.uci)
                .and_then(|(from, to, promotion)| self.rules.apply_move(from, to, promotion));
            if replayed.is_none() {
                return Err(RulesError::ReplayFailed(record.uci.clone()));
            }
        }
        Ok(())
    }

    fn snapshot_now(&self) -> Snapshot {
        Snapshot {
            fen: self.rules.current_position(),
            turn: self.rules.side_to_move(),
        }
    }

    fn touch(&mut self) {
        self.generation += 1;
    }
}
