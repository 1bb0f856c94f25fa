//! Delayed engine transitions.
//!
//! The engine never sleeps. It hands out a [`ScheduledTask`] and the driver
//! calls back with the task's token once the delay has passed. Tokens carry
//! the puzzle generation, so a callback that outlived its puzzle does nothing.

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskToken {
    pub(crate) generation: u64,
    pub(crate) seq: u64,
}

impl TaskToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Play the next scripted computer ply
    OpponentReply,
    /// Move on after a solve
    NextPuzzle,
    /// Restart the same puzzle after a wrong move
    RetryPuzzle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTask {
    pub token: TaskToken,
    pub action: TaskAction,
    pub delay: Duration,
}

/// How long each delayed transition waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub opponent_reply: Duration,
    pub next_puzzle: Duration,
    pub retry: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            opponent_reply: Duration::from_millis(500),
            next_puzzle: Duration::from_millis(1000),
            retry: Duration::from_millis(1000),
        }
    }
}

impl Pacing {
    /// No waiting at all; for synchronous drivers and tests.
    pub fn immediate() -> Self {
        Self {
            opponent_reply: Duration::ZERO,
            next_puzzle: Duration::ZERO,
            retry: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, action: TaskAction) -> Duration {
        match action {
            TaskAction::OpponentReply => self.opponent_reply,
            TaskAction::NextPuzzle => self.next_puzzle,
            TaskAction::RetryPuzzle => self.retry,
        }
    }
}
