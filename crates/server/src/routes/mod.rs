pub mod game;
pub mod health;
pub mod puzzles;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use chess_core::rules::color_code;
use chess_core::shakmaty::{Role, Square};
use chess_core::{GameStatus, MoveRecord, Navigation};
use chess_puzzler::Puzzle;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Puzzle training
        .route("/api/puzzles/next", get(puzzles::next_puzzle))
        .route("/api/puzzles/move", post(puzzles::submit_move))
        .route("/api/puzzles/status", get(puzzles::get_status))
        .route("/api/puzzles/navigate", post(puzzles::navigate))
        .route("/api/puzzles/progress", get(puzzles::get_progress))
        .route("/api/puzzles/level", get(puzzles::get_level))
        .route("/api/puzzles/reset", post(puzzles::reset_progress))
        // Free play
        .route("/api/game/status", get(game::get_status))
        .route("/api/game/move", post(game::make_move))
        .route("/api/game/load", post(game::load_position))
        .route("/api/game/reset", post(game::reset))
        .route("/api/game/navigate", post(game::navigate))
        .route("/api/game/legal-moves", get(game::legal_moves))
        .route("/api/game/computer-move", post(game::computer_move))
        .layer(Extension(state))
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Move submitted by the board UI.
#[derive(Debug, Deserialize, Validate)]
pub struct MoveBody {
    #[validate(length(equal = 2))]
    pub from: String,
    #[validate(length(equal = 2))]
    pub to: String,
    #[validate(length(equal = 1))]
    pub promotion: Option<String>,
}

impl MoveBody {
    pub fn parse(&self) -> Result<(Square, Square, Option<Role>), AppError> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let from = parse_square(&self.from)?;
        let to = parse_square(&self.to)?;
        let promotion = match self.promotion.as_deref() {
            None => None,
            Some(p) => {
                let role = p
                    .chars()
                    .next()
                    .and_then(|c| Role::from_char(c.to_ascii_lowercase()))
                    .filter(|r| !matches!(r, Role::Pawn | Role::King))
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid promotion piece: {p}")))?;
                Some(role)
            }
        };
        Ok((from, to, promotion))
    }
}

pub(crate) fn parse_square(name: &str) -> Result<Square, AppError> {
    name.to_ascii_lowercase()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid square: {name}")))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NavTarget {
    Index(usize),
    Named(String),
}

#[derive(Debug, Deserialize)]
pub struct NavigateBody {
    pub target: NavTarget,
}

impl NavigateBody {
    pub fn navigation(&self) -> Result<Navigation, AppError> {
        match &self.target {
            NavTarget::Index(i) => Ok(Navigation::Move(*i)),
            NavTarget::Named(name) => match name.to_ascii_lowercase().as_str() {
                "start" => Ok(Navigation::Start),
                "previous" | "prev" => Ok(Navigation::Previous),
                "next" => Ok(Navigation::Next),
                "end" => Ok(Navigation::End),
                other => Err(AppError::BadRequest(format!("Unknown navigation target: {other}"))),
            },
        }
    }
}

pub fn move_json(record: &MoveRecord) -> JsonValue {
    json!({
        "san": record.notation,
        "uci": record.uci,
        "color": color_code(record.color),
        "captured": record.captured.map(|r| r.char().to_string()),
    })
}

pub fn status_json(status: &GameStatus) -> JsonValue {
    let history: Vec<JsonValue> = status.move_history.iter().map(move_json).collect();
    json!({
        "fen": status.fen,
        "turn": color_code(status.side_to_move),
        "in_check": status.in_check,
        "is_checkmate": status.is_checkmate,
        "is_draw": status.is_draw,
        "is_stalemate": status.is_stalemate,
        "is_threefold_repetition": status.is_threefold_repetition,
        "is_insufficient_material": status.is_insufficient_material,
        "is_game_over": status.is_game_over,
        "move_history": history,
        "captured": status.captured,
        "current_move_index": status.current_move_index.map_or(-1, |i| i as i64),
    })
}

/// Puzzle as shown to the learner. The solution line stays server-side.
pub fn puzzle_json(puzzle: &Puzzle) -> JsonValue {
    json!({
        "id": puzzle.id,
        "fen": puzzle.fen,
        "rating": puzzle.rating,
        "theme": puzzle.theme,
        "description": puzzle.description,
        "solver_color": color_code(puzzle.solver()),
        "solution_length": puzzle.solver_moves().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(from: &str, to: &str, promotion: Option<&str>) -> MoveBody {
        MoveBody {
            from: from.to_string(),
            to: to.to_string(),
            promotion: promotion.map(str::to_string),
        }
    }

    #[test]
    fn test_move_body_parses_squares_and_promotion() {
        let (from, to, promo) = body("E7", "e8", Some("N")).parse().unwrap();
        assert_eq!(from, Square::E7);
        assert_eq!(to, Square::E8);
        assert_eq!(promo, Some(Role::Knight));
    }

    #[test]
    fn test_move_body_rejects_bad_input() {
        assert!(body("e9", "e4", None).parse().is_err());
        assert!(body("e2e", "e4", None).parse().is_err());
        assert!(body("e7", "e8", Some("k")).parse().is_err());
        assert!(body("e7", "e8", Some("qq")).parse().is_err());
    }

    #[test]
    fn test_navigation_targets() {
        let nav: NavigateBody = serde_json::from_str(r#"{"target": "prev"}"#).unwrap();
        assert_eq!(nav.navigation().unwrap(), Navigation::Previous);
        let nav: NavigateBody = serde_json::from_str(r#"{"target": 3}"#).unwrap();
        assert_eq!(nav.navigation().unwrap(), Navigation::Move(3));
        let nav: NavigateBody = serde_json::from_str(r#"{"target": "sideways"}"#).unwrap();
        assert!(nav.navigation().is_err());
    }

    #[test]
    fn test_status_json_reports_start_cursor_as_minus_one() {
        let session = chess_core::GameSession::<chess_core::ShakmatyRules>::new();
        let value = status_json(&session.status());
        assert_eq!(value["current_move_index"], -1);
        assert_eq!(value["turn"], "w");
        assert_eq!(value["move_history"], json!([]));
        assert_eq!(value["captured"], json!({ "white": [], "black": [] }));
    }
}
