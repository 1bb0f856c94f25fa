//! Rating-banded puzzle catalog.
//!
//! Catalog files are JSON objects keyed by level id:
//!
//! ```json
//! { "iniciante_1": { "info": { "rating_min": 0, "rating_max": 800, "total_puzzles": 3 },
//!                    "puzzles": [ ... ] } }
//! ```
//!
//! Levels are kept sorted by `rating_min`. The catalog is immutable once built.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::puzzle::Puzzle;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog contains no levels")]
    Empty,

    #[error("Duplicate level id: {0}")]
    DuplicateLevel(String),

    #[error("Duplicate puzzle id: {0}")]
    DuplicatePuzzle(String),

    #[error("Level {id} has an empty rating band ({min}..{max})")]
    InvalidBand { id: String, min: i32, max: i32 },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid catalog pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// One rating band and its ordered puzzles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: String,
    pub rating_min: i32,
    /// Exclusive upper bound
    pub rating_max: i32,
    /// Declared puzzle count, informational only
    pub total_puzzles: usize,
    pub puzzles: Vec<Puzzle>,
}

impl Level {
    pub fn contains(&self, rating: i32) -> bool {
        rating >= self.rating_min && rating < self.rating_max
    }
}

#[derive(Debug, Deserialize)]
struct LevelFile {
    info: LevelInfoFile,
    #[serde(default)]
    puzzles: Vec<Puzzle>,
}

#[derive(Debug, Deserialize)]
struct LevelInfoFile {
    rating_min: i32,
    rating_max: i32,
    #[serde(default)]
    total_puzzles: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PuzzleCatalog {
    levels: Vec<Level>,
}

impl PuzzleCatalog {
    /// The catalog compiled into the crate.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let files: BTreeMap<String, LevelFile> = serde_json::from_str(json)?;
        Self::from_levels(collect_levels(files, &mut HashSet::new())?)
    }

    /// Load a single catalog file, or every `*.json` file in a directory.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.is_dir() {
            let json = read(path)?;
            let catalog = Self::from_json(&json)?;
            info!(path = %path.display(), levels = catalog.levels.len(), "catalog loaded");
            return Ok(catalog);
        }

        let pattern = path.join("*.json");
        let mut files: Vec<_> = glob::glob(&pattern.to_string_lossy())?
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable catalog entry");
                    None
                }
            })
            .collect();
        files.sort();

        let mut seen = HashSet::new();
        let mut levels = Vec::new();
        for file in &files {
            let parsed: BTreeMap<String, LevelFile> = serde_json::from_str(&read(file)?)?;
            levels.extend(collect_levels(parsed, &mut seen)?);
        }

        let catalog = Self::from_levels(levels)?;
        info!(
            path = %path.display(),
            files = files.len(),
            levels = catalog.levels.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_levels(mut levels: Vec<Level>) -> Result<Self, CatalogError> {
        if levels.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut level_ids = HashSet::new();
        let mut puzzle_ids = HashSet::new();
        for level in &levels {
            if !level_ids.insert(level.id.as_str()) {
                return Err(CatalogError::DuplicateLevel(level.id.clone()));
            }
            if level.rating_min >= level.rating_max {
                return Err(CatalogError::InvalidBand {
                    id: level.id.clone(),
                    min: level.rating_min,
                    max: level.rating_max,
                });
            }
            for puzzle in &level.puzzles {
                if !puzzle_ids.insert(puzzle.id.as_str()) {
                    return Err(CatalogError::DuplicatePuzzle(puzzle.id.clone()));
                }
            }
            if level.total_puzzles != level.puzzles.len() {
                warn!(
                    level = %level.id,
                    declared = level.total_puzzles,
                    actual = level.puzzles.len(),
                    "declared puzzle count does not match"
                );
            }
        }

        levels.sort_by_key(|l| l.rating_min);
        for pair in levels.windows(2) {
            if pair[1].rating_min < pair[0].rating_max {
                warn!(lower = %pair[0].id, upper = %pair[1].id, "rating bands overlap");
            }
        }

        Ok(Self { levels })
    }

    /// Levels in ascending rating order. Never empty.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, id: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.id == id)
    }

    pub fn level_index(&self, id: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.id == id)
    }

    /// The level after `id` in rating order.
    pub fn next_level(&self, id: &str) -> Option<&Level> {
        self.level_index(id).and_then(|i| self.levels.get(i + 1))
    }

    /// Index of the level a rating belongs to. Ratings below every band map to
    /// the lowest level; ratings in a gap or above every band map to the
    /// highest level starting at or below them.
    pub fn level_index_for(&self, rating: i32) -> usize {
        if let Some(i) = self.levels.iter().position(|l| l.contains(rating)) {
            return i;
        }
        self.levels
            .iter()
            .rposition(|l| l.rating_min <= rating)
            .unwrap_or(0)
    }

    pub fn level_for(&self, rating: i32) -> &Level {
        &self.levels[self.level_index_for(rating)]
    }

    pub fn puzzle(&self, id: &str) -> Option<(&Level, &Puzzle)> {
        self.levels
            .iter()
            .find_map(|l| l.puzzles.iter().find(|p| p.id == id).map(|p| (l, p)))
    }

    pub fn puzzle_count(&self) -> usize {
        self.levels.iter().map(|l| l.puzzles.len()).sum()
    }
}

fn collect_levels(
    files: BTreeMap<String, LevelFile>,
    seen: &mut HashSet<String>,
) -> Result<Vec<Level>, CatalogError> {
    files
        .into_iter()
        .map(|(id, file)| {
            if !seen.insert(id.clone()) {
                return Err(CatalogError::DuplicateLevel(id));
            }
            Ok(Level {
                total_puzzles: file.info.total_puzzles.unwrap_or(file.puzzles.len()),
                rating_min: file.info.rating_min,
                rating_max: file.info.rating_max,
                puzzles: file.puzzles,
                id,
            })
        })
        .collect()
}

fn read(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}
