//! Learner progress: rating, streaks, solved set and catalog cursor.
//!
//! The whole record round-trips through one JSON document stored under a
//! single key, so any key-value backend can hold it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_RATING: i32 = 600;
pub const RATING_FLOOR: i32 = 400;
pub const FAILURE_PENALTY: i32 = 5;
pub const SOLVE_BONUS: i32 = 10;
pub const DEFAULT_LEVEL: &str = "iniciante_1";
/// Storage key the progress document lives under.
pub const PROGRESS_KEY: &str = "puzzleProgress";

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid progress document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Progress storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub rating: i32,
    #[serde(rename = "solvedPuzzles", default)]
    pub solved: BTreeSet<String>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    #[serde(default)]
    pub total_solved: u32,
    #[serde(default = "default_level")]
    pub current_level: String,
    #[serde(default)]
    pub current_puzzle_index: usize,
}

fn default_level() -> String {
    DEFAULT_LEVEL.to_string()
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            solved: BTreeSet::new(),
            current_streak: 0,
            best_streak: 0,
            total_solved: 0,
            current_level: default_level(),
            current_puzzle_index: 0,
        }
    }
}

/// Rating after solving a puzzle rated `puzzle_rating`.
pub fn rating_after_solve(rating: i32, puzzle_rating: i32) -> i32 {
    rating + (puzzle_rating - rating).div_euclid(10) + SOLVE_BONUS
}

pub fn rating_after_failure(rating: i32) -> i32 {
    (rating - FAILURE_PENALTY).max(RATING_FLOOR)
}

/// Owns the progress record and applies outcome updates to it.
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    progress: UserProgress,
}

impl ProgressStore {
    pub fn new(progress: UserProgress) -> Self {
        Self { progress }
    }

    /// Rebuild from a stored document. Missing or unreadable data starts fresh.
    pub fn restore(serialized: Option<&str>) -> Self {
        let Some(raw) = serialized else {
            return Self::default();
        };
        match serde_json::from_str::<UserProgress>(raw) {
            Ok(progress) => Self::new(progress),
            Err(e) => {
                warn!(error = %e, "stored progress unreadable, starting fresh");
                Self::default()
            }
        }
    }

    pub fn serialize(&self) -> Result<String, ProgressError> {
        Ok(serde_json::to_string(&self.progress)?)
    }

    pub fn load_from(repo: &dyn ProgressRepository, key: &str) -> Result<Self, ProgressError> {
        Ok(Self::restore(repo.load(key)?.as_deref()))
    }

    pub fn save_to(&self, repo: &dyn ProgressRepository, key: &str) -> Result<(), ProgressError> {
        repo.save(key, &self.serialize()?)
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> UserProgress {
        self.progress.clone()
    }

    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn rating(&self) -> i32 {
        self.progress.rating
    }

    pub fn is_solved(&self, puzzle_id: &str) -> bool {
        self.progress.solved.contains(puzzle_id)
    }

    pub fn current_level(&self) -> &str {
        &self.progress.current_level
    }

    pub fn current_puzzle_index(&self) -> usize {
        self.progress.current_puzzle_index
    }

    /// Apply a solve. A puzzle already in the solved set changes nothing and
    /// returns false.
    pub(crate) fn record_solved(&mut self, puzzle_id: &str, puzzle_rating: i32) -> bool {
        let p = &mut self.progress;
        if !p.solved.insert(puzzle_id.to_string()) {
            debug!(puzzle_id, "puzzle already solved, progress unchanged");
            return false;
        }
        p.total_solved += 1;
        p.current_streak += 1;
        p.best_streak = p.best_streak.max(p.current_streak);
        p.rating = rating_after_solve(p.rating, puzzle_rating);
        true
    }

    pub(crate) fn record_failed(&mut self) {
        let p = &mut self.progress;
        p.current_streak = 0;
        p.rating = rating_after_failure(p.rating);
    }

    pub(crate) fn set_cursor(&mut self, level_id: &str, index: usize) {
        if self.progress.current_level != level_id {
            self.progress.current_level = level_id.to_string();
        }
        self.progress.current_puzzle_index = index;
    }

    pub(crate) fn reset(&mut self) {
        self.progress = UserProgress::default();
    }
}

/// Key-value persistence for the progress document.
pub trait ProgressRepository: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, ProgressError>;

    fn save(&self, key: &str, value: &str) -> Result<(), ProgressError>;
}

/// Process-local storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressRepository for MemoryRepository {
    fn load(&self, key: &str) -> Result<Option<String>, ProgressError> {
        let entries = self.entries.lock().map_err(|_| ProgressError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), ProgressError> {
        let mut entries = self.entries.lock().map_err(|_| ProgressError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ProgressError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ProgressError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ProgressRepository for FileRepository {
    fn load(&self, key: &str) -> Result<Option<String>, ProgressError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ProgressError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), ProgressError> {
        let path = self.path_for(key)?;
        let io_err = |source| ProgressError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        // Write then rename so a crash never leaves a half-written document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;
        Ok(())
    }
}
