//! Puzzle training on top of `chess-core`: catalog, learner progress and the
//! engine that drives a solving session.

pub mod catalog;
pub mod engine;
pub mod progress;
pub mod puzzle;

pub use catalog::{CatalogError, Level, PuzzleCatalog};
pub use engine::{
    EngineState, FireOutcome, LevelInfo, MoveVerdict, Pacing, PuzzleDefect, PuzzleEngine,
    PuzzleOutcome, PuzzleSession, RejectReason, ScheduledTask, TaskAction, TaskToken,
};
pub use progress::{
    FileRepository, MemoryRepository, ProgressError, ProgressRepository, ProgressStore,
    UserProgress, PROGRESS_KEY,
};
pub use puzzle::Puzzle;
