use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chess_puzzler::{Pacing, PROGRESS_KEY};

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres progress storage; falls back to a local directory when unset
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Catalog file or directory; the bundled catalog when unset
    pub catalog_path: Option<PathBuf>,
    pub progress_dir: PathBuf,
    pub progress_key: String,
    pub stockfish_path: Option<String>,
    pub pacing: Pacing,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Pacing::default();
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            catalog_path: env::var("CATALOG_PATH").ok().map(PathBuf::from),
            progress_dir: env::var("PROGRESS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/progress")),
            progress_key: env::var("PROGRESS_KEY").unwrap_or_else(|_| PROGRESS_KEY.to_string()),
            stockfish_path: env::var("STOCKFISH_PATH").ok().filter(|v| !v.is_empty()),
            pacing: Pacing {
                opponent_reply: env_millis("OPPONENT_REPLY_DELAY_MS", defaults.opponent_reply),
                next_puzzle: env_millis("NEXT_PUZZLE_DELAY_MS", defaults.next_puzzle),
                retry: env_millis("RETRY_DELAY_MS", defaults.retry),
            },
        }
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
