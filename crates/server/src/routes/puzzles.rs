use axum::{Extension, Json};
use chess_core::rules::color_code;
use chess_puzzler::{MoveVerdict, PuzzleEngine, PuzzleOutcome, ScheduledTask};
use serde_json::{json, Value as JsonValue};

use super::{move_json, puzzle_json, status_json, MoveBody, NavigateBody};
use crate::error::AppError;
use crate::state::AppState;

fn pending_json(task: Option<ScheduledTask>) -> JsonValue {
    match task {
        Some(task) => json!({
            "action": task.action,
            "delay_ms": task.delay.as_millis() as u64,
        }),
        None => JsonValue::Null,
    }
}

/// Board, puzzle and engine state in one document.
fn trainer_json(engine: &PuzzleEngine) -> JsonValue {
    let session = engine.puzzle_session();
    json!({
        "state": engine.state(),
        "puzzle": engine.current_puzzle().map(puzzle_json),
        "human_color": engine.human_color().map(color_code),
        "solved_plies": session.map_or(0, |s| s.played().len()),
        "last_outcome": session.and_then(|s| s.last_outcome()),
        "pending": pending_json(engine.pending()),
        "status": status_json(&engine.status()),
    })
}

/// GET /api/puzzles/next
/// Abandon the current puzzle and load the next one for the learner's rating.
pub async fn next_puzzle(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let (body, document) = {
        let mut engine = state.trainer.lock().await;
        let exhausted = engine.get_next_puzzle().is_none();
        let mut body = trainer_json(&engine);
        body["exhausted"] = json!(exhausted);
        body["progress"] = json!(engine.get_user_progress());
        body["level"] = json!(engine.get_current_level_info());
        (body, engine.progress().serialize()?)
    };

    // The catalog cursor moved
    state.save_progress(&document).await?;
    Ok(Json(body))
}

/// POST /api/puzzles/move
pub async fn submit_move(
    Extension(state): Extension<AppState>,
    Json(body): Json<MoveBody>,
) -> Result<Json<JsonValue>, AppError> {
    let (from, to, promotion) = body.parse()?;

    let (verdict, mut response, document) = {
        let mut engine = state.trainer.lock().await;
        let verdict = engine.submit_move(from, to, promotion);
        let mut response = trainer_json(&engine);
        response["progress"] = json!(engine.get_user_progress());
        (verdict, response, engine.progress().serialize()?)
    };

    match &verdict {
        MoveVerdict::Rejected(reason) => {
            return Err(AppError::BadRequest(reason.message().to_string()));
        }
        MoveVerdict::Continue { played, .. } => {
            response["result"] = json!(PuzzleOutcome::Continue);
            response["move"] = move_json(played);
        }
        MoveVerdict::Solved {
            played,
            rating_change,
            ..
        } => {
            response["result"] = json!(PuzzleOutcome::Solved);
            response["move"] = move_json(played);
            response["rating_change"] = json!(rating_change);
        }
        MoveVerdict::Failed {
            played,
            expected,
            rating_change,
            ..
        } => {
            response["result"] = json!(PuzzleOutcome::Failed);
            response["move"] = move_json(played);
            response["expected"] = json!(expected);
            response["rating_change"] = json!(rating_change);
        }
    }

    // Saved before the transition is scheduled, so the task's newer document lands last
    let saved = if matches!(
        verdict.outcome(),
        Some(PuzzleOutcome::Solved | PuzzleOutcome::Failed)
    ) {
        state.save_progress(&document).await
    } else {
        Ok(())
    };
    if let Some(task) = verdict.scheduled() {
        state.schedule(task);
    }
    saved?;

    Ok(Json(response))
}

/// GET /api/puzzles/status
pub async fn get_status(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let engine = state.trainer.lock().await;
    Ok(Json(trainer_json(&engine)))
}

/// POST /api/puzzles/navigate
pub async fn navigate(
    Extension(state): Extension<AppState>,
    Json(body): Json<NavigateBody>,
) -> Result<Json<JsonValue>, AppError> {
    let target = body.navigation()?;
    let mut engine = state.trainer.lock().await;
    if !engine.navigate(target) {
        return Err(AppError::BadRequest("Cannot navigate there".to_string()));
    }
    Ok(Json(trainer_json(&engine)))
}

/// GET /api/puzzles/progress
pub async fn get_progress(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let engine = state.trainer.lock().await;
    Ok(Json(json!(engine.get_user_progress())))
}

/// GET /api/puzzles/level
pub async fn get_level(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let engine = state.trainer.lock().await;
    Ok(Json(json!(engine.get_current_level_info())))
}

/// POST /api/puzzles/reset
/// Wipe rating, streaks and solved puzzles.
pub async fn reset_progress(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let (progress, document) = {
        let mut engine = state.trainer.lock().await;
        engine.reset_progress();
        (engine.get_user_progress(), engine.progress().serialize()?)
    };
    state.save_progress(&document).await?;
    tracing::info!("Progress reset via API");
    Ok(Json(json!({ "ok": true, "progress": progress })))
}
