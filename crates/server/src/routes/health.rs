use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};

use crate::state::AppState;

/// GET /health
pub async fn health_check(Extension(state): Extension<AppState>) -> Json<JsonValue> {
    let engine = state.trainer.lock().await;
    Json(json!({
        "status": "ok",
        "puzzles": engine.catalog().puzzle_count(),
        "storage": state.progress.name(),
        "stockfish": state.stockfish.is_some(),
    }))
}
