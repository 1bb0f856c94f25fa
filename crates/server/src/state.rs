//! Shared server state and the timer driver for delayed puzzle transitions.

use std::sync::Arc;

use chess_core::GameSession;
use chess_puzzler::{FireOutcome, PuzzleEngine, ScheduledTask};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clients::stockfish::StockfishEngine;
use crate::db::progress::ProgressBackend;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub trainer: Arc<Mutex<PuzzleEngine>>,
    pub game: Arc<Mutex<GameSession>>,
    pub progress: ProgressBackend,
    pub progress_key: Arc<str>,
    pub stockfish: Option<Arc<Mutex<StockfishEngine>>>,
}

impl AppState {
    pub fn new(
        trainer: PuzzleEngine,
        progress: ProgressBackend,
        progress_key: &str,
        stockfish: Option<StockfishEngine>,
    ) -> Self {
        Self {
            trainer: Arc::new(Mutex::new(trainer)),
            game: Arc::new(Mutex::new(GameSession::new())),
            progress,
            progress_key: Arc::from(progress_key),
            stockfish: stockfish.map(|sf| Arc::new(Mutex::new(sf))),
        }
    }

    pub async fn save_progress(&self, document: &str) -> Result<(), AppError> {
        self.progress.save(&self.progress_key, document).await
    }

    /// Fire `task` after its delay. A task superseded in the meantime is a no-op.
    pub fn schedule(&self, task: ScheduledTask) {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(task.delay).await;

            let (outcome, document) = {
                let mut trainer = state.trainer.lock().await;
                let outcome = trainer.fire(task.token);
                (outcome, trainer.progress().serialize())
            };

            if outcome == FireOutcome::Stale {
                debug!(action = ?task.action, "scheduled task superseded");
                return;
            }
            debug!(action = ?task.action, ?outcome, "scheduled task fired");

            let saved = match document {
                Ok(document) => state.save_progress(&document).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = saved {
                warn!(error = %e, "failed to save progress after scheduled task");
            }
        });
    }
}
