/// Puzzle data model and solution-line helpers

use chess_core::shakmaty::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A scripted puzzle: start position plus the full alternating solution line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    #[serde(alias = "PuzzleId")]
    pub id: String,
    /// Start position (FEN)
    #[serde(alias = "FEN")]
    pub fen: String,
    /// Solution plies in coordinate notation; ply 0 belongs to the side to move
    #[serde(alias = "Moves", deserialize_with = "deserialize_plies")]
    pub moves: Vec<String>,
    #[serde(alias = "Rating")]
    pub rating: i32,
    #[serde(alias = "Themes", default)]
    pub theme: String,
    #[serde(default)]
    pub description: String,
    /// The side the human plays. Defaults to White.
    #[serde(
        rename = "solver_color",
        default,
        deserialize_with = "deserialize_side",
        serialize_with = "serialize_side",
        skip_serializing_if = "Option::is_none"
    )]
    pub solver: Option<Color>,
}

impl Puzzle {
    /// Side to move in the start position, read from the FEN.
    pub fn start_side(&self) -> Color {
        match self.fen.split_whitespace().nth(1) {
            Some("b") => Color::Black,
            _ => Color::White,
        }
    }

    /// The side the human plays.
    pub fn solver(&self) -> Color {
        self.solver.unwrap_or(Color::White)
    }

    pub fn solver_moves_first(&self) -> bool {
        self.solver() == self.start_side()
    }

    /// Index of the first solver ply in `moves`.
    fn solver_offset(&self) -> usize {
        if self.solver_moves_first() {
            0
        } else {
            1
        }
    }

    /// Plies the human must find, in order.
    pub fn solver_moves(&self) -> Vec<String> {
        self.moves
            .iter()
            .skip(self.solver_offset())
            .step_by(2)
            .cloned()
            .collect()
    }

    /// Scripted plies of the computer side, in order.
    pub fn opponent_moves(&self) -> Vec<String> {
        self.moves
            .iter()
            .skip(1 - self.solver_offset())
            .step_by(2)
            .cloned()
            .collect()
    }

    /// The computer's opening ply when the human does not move first.
    pub fn opening_reply(&self) -> Option<&str> {
        if self.solver_moves_first() {
            None
        } else {
            self.moves.first().map(String::as_str)
        }
    }

    /// Scripted reply following the human's `solved`-th correct ply (1-based).
    pub fn reply_after(&self, solved: usize) -> Option<&str> {
        if solved == 0 {
            return None;
        }
        self.moves
            .get(self.solver_offset() + 2 * solved - 1)
            .map(String::as_str)
    }
}

/// Compare a played ply with the scripted one, ignoring case. A scripted ply
/// without a promotion letter accepts any promotion on the same squares.
pub fn plies_match(played: &str, expected: &str) -> bool {
    let played = played.trim();
    let expected = expected.trim();
    if played.eq_ignore_ascii_case(expected) {
        return true;
    }
    expected.len() == 4
        && played.len() == 5
        && played.is_char_boundary(4)
        && played[..4].eq_ignore_ascii_case(expected)
}

/// Accept either a JSON array of plies or a space-separated line.
fn deserialize_plies<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Plies {
        List(Vec<String>),
        Line(String),
    }

    Ok(match Plies::deserialize(deserializer)? {
        Plies::List(list) => list,
        Plies::Line(line) => line.split_whitespace().map(str::to_string).collect(),
    })
}

fn deserialize_side<'de, D>(deserializer: D) -> Result<Option<Color>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("w") | Some("white") => Ok(Some(Color::White)),
        Some("b") | Some("black") => Ok(Some(Color::Black)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid solver_color: {other}"
        ))),
    }
}

fn serialize_side<S>(side: &Option<Color>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match side {
        Some(color) => serializer.serialize_str(chess_core::rules::color_code(*color)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(fen: &str, moves: &[&str], solver: Option<Color>) -> Puzzle {
        Puzzle {
            id: "p".to_string(),
            fen: fen.to_string(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
            rating: 1000,
            theme: String::new(),
            description: String::new(),
            solver,
        }
    }

    #[test]
    fn test_white_to_move_solver_takes_even_plies() {
        let p = puzzle(
            "3r1rk1/1pp2ppp/1p2pn2/8/3P4/2P1P3/PP3PPP/2KR3R w - - 0 1",
            &["d4d5", "f6d5", "d1d5"],
            None,
        );
        assert!(p.solver_moves_first());
        assert_eq!(p.solver_moves(), vec!["d4d5", "d1d5"]);
        assert_eq!(p.opponent_moves(), vec!["f6d5"]);
        assert_eq!(p.opening_reply(), None);
        assert_eq!(p.reply_after(1), Some("f6d5"));
        assert_eq!(p.reply_after(2), None);
    }

    #[test]
    fn test_black_to_move_computer_opens() {
        let p = puzzle(
            "1r4k1/p4ppp/8/8/8/8/4RPPP/4R1K1 b - - 0 1",
            &["a7a6", "e2e8", "b8e8", "e1e8"],
            None,
        );
        assert_eq!(p.start_side(), Color::Black);
        assert!(!p.solver_moves_first());
        assert_eq!(p.opening_reply(), Some("a7a6"));
        assert_eq!(p.solver_moves(), vec!["e2e8", "e1e8"]);
        assert_eq!(p.reply_after(1), Some("b8e8"));
    }

    #[test]
    fn test_explicit_black_solver_moves_first() {
        let p = puzzle(
            "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2",
            &["d8h4"],
            Some(Color::Black),
        );
        assert!(p.solver_moves_first());
        assert_eq!(p.solver_moves(), vec!["d8h4"]);
        assert!(p.opponent_moves().is_empty());
    }

    #[test]
    fn test_plies_match() {
        assert!(plies_match("h5f7", "H5F7"));
        assert!(plies_match("e7e8q", "e7e8"));
        assert!(plies_match("e7e8q", "e7e8Q"));
        assert!(!plies_match("e7e8n", "e7e8q"));
        assert!(!plies_match("e7e8", "e7e8q"));
        assert!(!plies_match("h5f7", "h5h7"));
    }

    #[test]
    fn test_deserialize_lichess_style_record() {
        let json = r#"{
            "PuzzleId": "00sHx",
            "FEN": "q3k1nr/1pp1nQpp/3p4/1P2p3/4P3/B1PP1b2/B5PP/5K2 b k - 0 17",
            "Moves": "e8d7 a2e6 d7d8 f7f8",
            "Rating": 1760,
            "Themes": "mate mateIn2"
        }"#;
        let p: Puzzle = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, "00sHx");
        assert_eq!(p.moves.len(), 4);
        assert_eq!(p.rating, 1760);
        assert_eq!(p.solver, None);
        assert_eq!(p.description, "");
    }

    #[test]
    fn test_solver_color_round_trips() {
        let json = r#"{"id":"x","fen":"8/8/8/8/8/8/8/8 b - - 0 1","moves":["a1a2"],"rating":900,"solver_color":"b"}"#;
        let p: Puzzle = serde_json::from_str(json).unwrap();
        assert_eq!(p.solver, Some(Color::Black));
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["solver_color"], "b");
    }
}
