//! Stockfish wrapper for free-play computer moves (UCI over async pipes)

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// Highest difficulty accepted; maps to search depth.
pub const MAX_DIFFICULTY: u32 = 22;
/// Stockfish caps `Skill Level` at 20.
const MAX_SKILL_LEVEL: u32 = 20;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn Stockfish: {0}")]
    Spawn(std::io::Error),

    #[error("Stockfish I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stockfish closed its output")]
    Closed,

    #[error("Stockfish did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Stockfish found no move")]
    NoMove,
}

pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a Stockfish process and complete the UCI handshake.
    pub async fn new(path: &str) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(EngineError::Spawn)?;

        let (Some(stdin), Some(stdout)) = (process.stdin.take(), process.stdout.take()) else {
            return Err(EngineError::Closed);
        };

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name Hash value 64").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line).await? == 0 {
            return Err(EngineError::Closed);
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Best move for `fen` in coordinate notation. `difficulty` (1-22) sets
    /// both skill level and search depth.
    pub async fn best_move(&mut self, fen: &str, difficulty: u32) -> Result<String, EngineError> {
        let difficulty = difficulty.clamp(1, MAX_DIFFICULTY);
        let skill = difficulty.min(MAX_SKILL_LEVEL);

        self.send(&format!("setoption name Skill Level value {skill}")).await?;
        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {difficulty}")).await?;

        let search = async {
            loop {
                let line = self.read_line().await?;
                if line.starts_with("bestmove") {
                    return parse_bestmove(&line).ok_or(EngineError::NoMove);
                }
            }
        };

        tokio::time::timeout(SEARCH_TIMEOUT, search)
            .await
            .map_err(|_| EngineError::Timeout(SEARCH_TIMEOUT))?
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// Move from a `bestmove` line; `None` for "(none)" or a malformed line.
fn parse_bestmove(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    match parts.next()? {
        "(none)" | "0000" => None,
        mv => Some(mv.to_string()),
    }
}
