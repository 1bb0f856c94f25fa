//! Puzzle-training state machine.
//!
//! Selects the next puzzle for the learner's rating, checks each submitted
//! move against the scripted line, plays the computer's replies and applies
//! rating updates. Delayed transitions are returned as [`ScheduledTask`]s for
//! the caller to fire later.

pub mod schedule;
pub mod validate;

use std::collections::HashSet;
use std::sync::Arc;

use chess_core::shakmaty::{Color, Role, Square};
use chess_core::{GameSession, GameStatus, MoveRecord, Navigation, RulesEngine, ShakmatyRules};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::PuzzleCatalog;
use crate::progress::{ProgressStore, UserProgress};
use crate::puzzle::{plies_match, Puzzle};

pub use schedule::{Pacing, ScheduledTask, TaskAction, TaskToken};
pub use validate::PuzzleDefect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    SelectingPuzzle,
    AwaitingUserMove,
    ApplyingOpponentReply,
    Solved,
    Failed,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoActivePuzzle,
    NotAwaitingMove,
    ViewingHistory,
    NotYourTurn,
    IllegalMove,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::NoActivePuzzle => "No puzzle is loaded",
            RejectReason::NotAwaitingMove => "Not waiting for a move",
            RejectReason::ViewingHistory => "Return to the latest position to move",
            RejectReason::NotYourTurn => "It is not your turn",
            RejectReason::IllegalMove => "Illegal move",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleOutcome {
    Continue,
    Solved,
    Failed,
}

/// Result of a submitted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveVerdict {
    /// Nothing changed
    Rejected(RejectReason),
    /// Correct, more plies to find; the computer replies when `reply` fires
    Continue {
        played: MoveRecord,
        reply: ScheduledTask,
    },
    Solved {
        played: MoveRecord,
        rating_change: i32,
        next: ScheduledTask,
    },
    Failed {
        played: MoveRecord,
        expected: String,
        rating_change: i32,
        retry: ScheduledTask,
    },
}

impl MoveVerdict {
    pub fn outcome(&self) -> Option<PuzzleOutcome> {
        match self {
            MoveVerdict::Rejected(_) => None,
            MoveVerdict::Continue { .. } => Some(PuzzleOutcome::Continue),
            MoveVerdict::Solved { .. } => Some(PuzzleOutcome::Solved),
            MoveVerdict::Failed { .. } => Some(PuzzleOutcome::Failed),
        }
    }

    pub fn scheduled(&self) -> Option<ScheduledTask> {
        match self {
            MoveVerdict::Rejected(_) => None,
            MoveVerdict::Continue { reply, .. } => Some(*reply),
            MoveVerdict::Solved { next, .. } => Some(*next),
            MoveVerdict::Failed { retry, .. } => Some(*retry),
        }
    }
}

/// What firing a scheduled task did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// Token no longer current; nothing changed
    Stale,
    OpponentMoved(MoveRecord),
    /// Next puzzle id, `None` when the catalog is exhausted
    NextPuzzle(Option<String>),
    Retried,
}

/// The active puzzle and the learner's attempt at it.
#[derive(Debug, Clone)]
pub struct PuzzleSession {
    puzzle: Puzzle,
    expected: Vec<String>,
    played: Vec<String>,
    last_outcome: Option<PuzzleOutcome>,
}

impl PuzzleSession {
    fn new(puzzle: Puzzle) -> Self {
        Self {
            expected: puzzle.solver_moves(),
            puzzle,
            played: Vec::new(),
            last_outcome: None,
        }
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    /// Correct plies played so far in this attempt.
    pub fn played(&self) -> &[String] {
        &self.played
    }

    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    pub fn last_outcome(&self) -> Option<PuzzleOutcome> {
        self.last_outcome
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub id: String,
    pub rating_min: i32,
    pub rating_max: i32,
    pub total_puzzles: usize,
    pub solved: usize,
}

pub struct PuzzleEngine<R = ShakmatyRules> {
    catalog: Arc<PuzzleCatalog>,
    progress: ProgressStore,
    session: GameSession<R>,
    active: Option<PuzzleSession>,
    state: EngineState,
    pacing: Pacing,
    /// Bumped whenever a puzzle is (re)loaded or abandoned
    generation: u64,
    next_seq: u64,
    pending: Option<ScheduledTask>,
    corrupt: HashSet<String>,
}

impl<R: RulesEngine + Default> PuzzleEngine<R> {
    pub fn new(catalog: Arc<PuzzleCatalog>, progress: ProgressStore) -> Self {
        Self {
            catalog,
            progress,
            session: GameSession::new(),
            active: None,
            state: EngineState::Idle,
            pacing: Pacing::default(),
            generation: 0,
            next_seq: 0,
            pending: None,
            corrupt: HashSet::new(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Abandon whatever is in progress and load the next unsolved puzzle.
    /// `None` when every remaining puzzle is solved or unplayable.
    pub fn get_next_puzzle(&mut self) -> Option<&Puzzle> {
        self.abandon();
        self.load_next();
        self.current_puzzle()
    }

    /// Check a move against the scripted line.
    pub fn submit_move(&mut self, from: Square, to: Square, promotion: Option<Role>) -> MoveVerdict {
        let Some(solver) = self.active.as_ref().map(|a| a.puzzle.solver()) else {
            return MoveVerdict::Rejected(RejectReason::NoActivePuzzle);
        };
        if self.state != EngineState::AwaitingUserMove {
            return MoveVerdict::Rejected(RejectReason::NotAwaitingMove);
        }
        if !self.session.is_at_tip() {
            return MoveVerdict::Rejected(RejectReason::ViewingHistory);
        }
        if self.session.side_to_move() != solver {
            return MoveVerdict::Rejected(RejectReason::NotYourTurn);
        }
        let Some(played) = self.session.apply_move(from, to, promotion) else {
            return MoveVerdict::Rejected(RejectReason::IllegalMove);
        };

        let Some(active) = self.active.as_mut() else {
            return MoveVerdict::Rejected(RejectReason::NoActivePuzzle);
        };
        let step = active.played.len();
        let expected = active.expected.get(step).cloned().unwrap_or_default();
        let puzzle_id = active.puzzle.id.clone();
        let puzzle_rating = active.puzzle.rating;
        let rating_before = self.progress.rating();

        if !plies_match(&played.uci, &expected) {
            active.last_outcome = Some(PuzzleOutcome::Failed);
            self.progress.record_failed();
            self.state = EngineState::Failed;
            let rating_change = self.progress.rating() - rating_before;
            info!(
                puzzle_id = %puzzle_id,
                played = %played.uci,
                expected = %expected,
                rating = self.progress.rating(),
                "puzzle failed"
            );
            let retry = self.schedule(TaskAction::RetryPuzzle);
            return MoveVerdict::Failed {
                played,
                expected,
                rating_change,
                retry,
            };
        }

        active.played.push(played.uci.clone());
        if active.played.len() < active.expected.len() {
            active.last_outcome = Some(PuzzleOutcome::Continue);
            self.state = EngineState::ApplyingOpponentReply;
            debug!(puzzle_id = %puzzle_id, ply = %played.uci, "correct move, awaiting reply");
            let reply = self.schedule(TaskAction::OpponentReply);
            return MoveVerdict::Continue { played, reply };
        }

        active.last_outcome = Some(PuzzleOutcome::Solved);
        let newly_solved = self.progress.record_solved(&puzzle_id, puzzle_rating);
        self.state = EngineState::Solved;
        let rating_change = self.progress.rating() - rating_before;
        info!(
            puzzle_id = %puzzle_id,
            newly_solved,
            rating = self.progress.rating(),
            streak = self.progress.progress().current_streak,
            "puzzle solved"
        );
        let next = self.schedule(TaskAction::NextPuzzle);
        MoveVerdict::Solved {
            played,
            rating_change,
            next,
        }
    }

    /// Coordinate-notation convenience over [`submit_move`](Self::submit_move).
    pub fn submit_uci(&mut self, ply: &str) -> MoveVerdict {
        match chess_core::rules::parse_uci(ply) {
            Some((from, to, promotion)) => self.submit_move(from, to, promotion),
            None => MoveVerdict::Rejected(RejectReason::IllegalMove),
        }
    }

    /// Run a scheduled transition. Stale tokens are ignored.
    pub fn fire(&mut self, token: TaskToken) -> FireOutcome {
        let task = match self.pending {
            Some(task) if task.token == token => task,
            _ => {
                debug!(generation = token.generation, "ignoring stale task");
                return FireOutcome::Stale;
            }
        };
        self.pending = None;

        match task.action {
            TaskAction::OpponentReply => self.play_opponent_reply(),
            TaskAction::NextPuzzle => {
                self.generation += 1;
                self.load_next();
                FireOutcome::NextPuzzle(self.current_puzzle().map(|p| p.id.clone()))
            }
            TaskAction::RetryPuzzle => {
                self.generation += 1;
                if self.begin_attempt() {
                    FireOutcome::Retried
                } else {
                    self.discard_active();
                    self.load_next();
                    FireOutcome::NextPuzzle(self.current_puzzle().map(|p| p.id.clone()))
                }
            }
        }
    }

    /// Fire the pending task now, ignoring its delay.
    pub fn run_pending(&mut self) -> Option<FireOutcome> {
        let token = self.pending?.token;
        Some(self.fire(token))
    }

    pub fn get_user_progress(&self) -> UserProgress {
        self.progress.snapshot()
    }

    pub fn get_current_level_info(&self) -> LevelInfo {
        let level = self
            .catalog
            .level(self.progress.current_level())
            .unwrap_or_else(|| self.catalog.level_for(self.progress.rating()));
        LevelInfo {
            id: level.id.clone(),
            rating_min: level.rating_min,
            rating_max: level.rating_max,
            total_puzzles: level.puzzles.len(),
            solved: level
                .puzzles
                .iter()
                .filter(|p| self.progress.is_solved(&p.id))
                .count(),
        }
    }

    /// Wipe progress back to defaults and unload the puzzle.
    pub fn reset_progress(&mut self) {
        self.abandon();
        self.progress.reset();
        self.active = None;
        self.state = EngineState::Idle;
        self.session.reset();
        info!("puzzle progress reset");
    }

    pub fn status(&self) -> GameStatus {
        self.session.status()
    }

    /// Move through the attempt's history. Moves are refused until back at the tip.
    pub fn navigate(&mut self, target: Navigation) -> bool {
        self.session.navigate(target)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn current_puzzle(&self) -> Option<&Puzzle> {
        self.active.as_ref().map(|a| &a.puzzle)
    }

    pub fn puzzle_session(&self) -> Option<&PuzzleSession> {
        self.active.as_ref()
    }

    /// Side the learner plays in the active puzzle.
    pub fn human_color(&self) -> Option<Color> {
        self.current_puzzle().map(Puzzle::solver)
    }

    pub fn pending(&self) -> Option<ScheduledTask> {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn catalog(&self) -> &PuzzleCatalog {
        &self.catalog
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Puzzle ids found unplayable so far.
    pub fn corrupt_puzzles(&self) -> &HashSet<String> {
        &self.corrupt
    }

    fn schedule(&mut self, action: TaskAction) -> ScheduledTask {
        self.next_seq += 1;
        let task = ScheduledTask {
            token: TaskToken {
                generation: self.generation,
                seq: self.next_seq,
            },
            action,
            delay: self.pacing.delay_for(action),
        };
        self.pending = Some(task);
        task
    }

    /// Invalidate every outstanding task.
    fn abandon(&mut self) {
        self.generation += 1;
        if let Some(task) = self.pending.take() {
            debug!(action = ?task.action, "cancelled pending task");
        }
    }

    fn load_next(&mut self) {
        self.state = EngineState::SelectingPuzzle;
        self.active = None;

        while let Some(puzzle) = self.select_next() {
            self.active = Some(PuzzleSession::new(puzzle));
            if self.begin_attempt() {
                if let Some(p) = self.current_puzzle() {
                    info!(
                        puzzle_id = %p.id,
                        rating = p.rating,
                        theme = %p.theme,
                        level = %self.progress.current_level(),
                        "puzzle loaded"
                    );
                }
                return;
            }
            self.discard_active();
        }

        self.state = EngineState::Exhausted;
        info!(rating = self.progress.rating(), "no puzzles left");
    }

    /// Walk the catalog from the learner's cursor to the first unsolved,
    /// playable puzzle, moving to higher levels as each one runs out.
    fn select_next(&mut self) -> Option<Puzzle> {
        let catalog = Arc::clone(&self.catalog);
        let mut level_index = catalog.level_index_for(self.progress.rating());

        let target = &catalog.levels()[level_index];
        if target.id != self.progress.current_level() {
            info!(
                from = %self.progress.current_level(),
                to = %target.id,
                rating = self.progress.rating(),
                "switching level"
            );
            self.progress.set_cursor(&target.id, 0);
        }
        let mut start = self.progress.current_puzzle_index();

        loop {
            let level = &catalog.levels()[level_index];
            for (index, puzzle) in level.puzzles.iter().enumerate().skip(start) {
                if self.progress.is_solved(&puzzle.id) || self.corrupt.contains(&puzzle.id) {
                    continue;
                }
                if let Err(defect) = validate::check::<R>(puzzle) {
                    warn!(puzzle_id = %puzzle.id, level = %level.id, %defect, "skipping unplayable puzzle");
                    self.corrupt.insert(puzzle.id.clone());
                    continue;
                }
                self.progress.set_cursor(&level.id, index);
                return Some(puzzle.clone());
            }

            level_index += 1;
            let next = catalog.levels().get(level_index)?;
            info!(from = %level.id, to = %next.id, "level exhausted, advancing");
            self.progress.set_cursor(&next.id, 0);
            start = 0;
        }
    }

    /// Put the active puzzle's start position on the board and, when the
    /// computer moves first, play its opening ply.
    fn begin_attempt(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        active.played.clear();
        active.last_outcome = None;

        if let Err(e) = self.session.load_position(&active.puzzle.fen) {
            error!(puzzle_id = %active.puzzle.id, error = %e, "start position rejected");
            return false;
        }
        if let Some(opening) = active.puzzle.opening_reply() {
            if self.session.apply_uci(opening).is_none() {
                error!(puzzle_id = %active.puzzle.id, ply = opening, "opening ply rejected");
                return false;
            }
        }

        self.state = EngineState::AwaitingUserMove;
        true
    }

    fn play_opponent_reply(&mut self) -> FireOutcome {
        let Some(active) = self.active.as_ref() else {
            return FireOutcome::Stale;
        };
        if self.state != EngineState::ApplyingOpponentReply {
            return FireOutcome::Stale;
        }
        let Some(reply) = active.puzzle.reply_after(active.played.len()).map(str::to_string) else {
            error!(puzzle_id = %active.puzzle.id, "scripted reply missing");
            self.discard_active();
            self.load_next();
            return FireOutcome::NextPuzzle(self.current_puzzle().map(|p| p.id.clone()));
        };

        // The learner may be browsing history while the reply is pending.
        if !self.session.is_at_tip() {
            self.session.navigate(Navigation::End);
        }

        match self.session.apply_uci(&reply) {
            Some(record) => {
                self.state = EngineState::AwaitingUserMove;
                debug!(ply = %record.uci, "opponent replied");
                FireOutcome::OpponentMoved(record)
            }
            None => {
                error!(ply = %reply, "scripted reply rejected");
                self.discard_active();
                self.load_next();
                FireOutcome::NextPuzzle(self.current_puzzle().map(|p| p.id.clone()))
            }
        }
    }

    /// Mark the active puzzle unplayable and drop it.
    fn discard_active(&mut self) {
        if let Some(active) = self.active.take() {
            warn!(puzzle_id = %active.puzzle.id, "puzzle marked unplayable");
            self.corrupt.insert(active.puzzle.id);
        }
    }
}
