//! Chess session layer: a rules-engine trait with a shakmaty adapter, a
//! position log with time travel, and the game session built on both.

pub mod captured;
pub mod position_log;
pub mod rules;
pub mod session;

pub use captured::CapturedPieces;
pub use position_log::{MoveRecord, PositionLog, Snapshot};
pub use rules::{AppliedMove, LegalMove, RulesEngine, RulesError, ShakmatyRules, STANDARD_START_FEN};
pub use session::{GameSession, GameStatus, Navigation, SuggestionDelivery, SuggestionTicket};

pub use shakmaty;
