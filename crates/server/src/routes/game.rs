use axum::extract::Query;
use axum::{Extension, Json};
use chess_core::SuggestionDelivery;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use super::{move_json, parse_square, status_json, MoveBody, NavigateBody};
use crate::clients::stockfish::MAX_DIFFICULTY;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/game/status
pub async fn get_status(
    Extension(state): Extension<AppState>,
) -> Result<Json<JsonValue>, AppError> {
    let game = state.game.lock().await;
    Ok(Json(status_json(&game.status())))
}

/// POST /api/game/move
pub async fn make_move(
    Extension(state): Extension<AppState>,
    Json(body): Json<MoveBody>,
) -> Result<Json<JsonValue>, AppError> {
    let (from, to, promotion) = body.parse()?;
    let mut game = state.game.lock().await;
    if game.status().is_game_over {
        return Err(AppError::BadRequest("Game is over".to_string()));
    }
    let record = game
        .apply_move(from, to, promotion)
        .ok_or_else(|| AppError::BadRequest("Illegal move".to_string()))?;
    Ok(Json(json!({
        "move": move_json(&record),
        "status": status_json(&game.status()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoadBody {
    pub fen: String,
}

/// POST /api/game/load
pub async fn load_position(
    Extension(state): Extension<AppState>,
    Json(body): Json<LoadBody>,
) -> Result<Json<JsonValue>, AppError> {
    let mut game = state.game.lock().await;
    game.load_position(&body.fen)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(status_json(&game.status())))
}

/// POST /api/game/reset
pub async fn reset(Extension(state): Extension<AppState>) -> Result<Json<JsonValue>, AppError> {
    let mut game = state.game.lock().await;
    game.reset();
    Ok(Json(status_json(&game.status())))
}

/// POST /api/game/navigate
pub async fn navigate(
    Extension(state): Extension<AppState>,
    Json(body): Json<NavigateBody>,
) -> Result<Json<JsonValue>, AppError> {
    let target = body.navigation()?;
    let mut game = state.game.lock().await;
    if !game.navigate(target) {
        return Err(AppError::BadRequest("Cannot navigate there".to_string()));
    }
    Ok(Json(status_json(&game.status())))
}

#[derive(Debug, Deserialize)]
pub struct LegalMovesQuery {
    pub from: Option<String>,
}

/// GET /api/game/legal-moves?from=e2
/// Destinations for move hints, optionally for one piece only.
pub async fn legal_moves(
    Extension(state): Extension<AppState>,
    Query(query): Query<LegalMovesQuery>,
) -> Result<Json<JsonValue>, AppError> {
    let from = query.from.as_deref().map(parse_square).transpose()?;
    let game = state.game.lock().await;
    let moves: Vec<JsonValue> = game
        .legal_moves(from)
        .iter()
        .map(|m| {
            json!({
                "from": m.from.to_string(),
                "to": m.to.to_string(),
                "promotion": m.promotion.map(|r| r.char().to_string()),
            })
        })
        .collect();
    Ok(Json(json!({ "moves": moves })))
}

fn default_difficulty() -> u32 {
    10
}

#[derive(Debug, Deserialize, Validate)]
pub struct ComputerMoveBody {
    #[serde(default = "default_difficulty")]
    #[validate(range(min = 1, max = 22))]
    pub difficulty: u32,
}

/// POST /api/game/computer-move
/// Ask Stockfish for a move and play it, unless the position changed meanwhile.
pub async fn computer_move(
    Extension(state): Extension<AppState>,
    Json(body): Json<ComputerMoveBody>,
) -> Result<Json<JsonValue>, AppError> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let Some(stockfish) = state.stockfish.clone() else {
        return Err(AppError::Unavailable("No engine configured".to_string()));
    };

    let (ticket, fen) = {
        let mut game = state.game.lock().await;
        if game.status().is_game_over {
            return Err(AppError::BadRequest("Game is over".to_string()));
        }
        if !game.is_at_tip() {
            return Err(AppError::BadRequest(
                "Return to the latest position first".to_string(),
            ));
        }
        (game.request_suggestion(), game.fen())
    };

    // The game lock is released while the engine thinks
    let uci = {
        let mut engine = stockfish.lock().await;
        engine.best_move(&fen, body.difficulty.min(MAX_DIFFICULTY)).await?
    };

    let mut game = state.game.lock().await;
    match game.deliver_suggestion(ticket, &uci) {
        SuggestionDelivery::Applied(record) => Ok(Json(json!({
            "move": move_json(&record),
            "status": status_json(&game.status()),
        }))),
        SuggestionDelivery::Stale => Err(AppError::Conflict(
            "Position changed while the engine was thinking".to_string(),
        )),
        SuggestionDelivery::Illegal => Err(AppError::Internal(format!(
            "Engine suggested an illegal move: {uci}"
        ))),
    }
}
