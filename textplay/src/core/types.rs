//! Shared deterministic types for the turn loop and session lifecycle.
//!
//! These types carry no I/O and serialize to stable lowercase names.

use std::fmt;

use serde::Serialize;

use crate::core::extract::{BannerInfo, GameState};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The configured maximum turn count was reached.
    Normal,
    /// The startup banner never arrived and no output was observed.
    Timeout,
    /// The game closed its output stream.
    StreamClosed,
    /// The decision source failed or produced no usable command.
    DecisionSourceFailure,
    /// A command could not be written to the game.
    TransportFailure,
}

impl EndReason {
    /// Human-readable status line printed when a run finishes.
    pub fn status_line(self) -> &'static str {
        match self {
            Self::Normal => "Agent finished: reached the maximum turn count",
            Self::Timeout => "Agent finished: timed out waiting for the game banner",
            Self::StreamClosed => "Game ended (EOF)",
            Self::DecisionSourceFailure => "Agent stopped: the decision source failed",
            Self::TransportFailure => "Agent stopped: failed to send command to game",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Timeout => "timeout",
            Self::StreamClosed => "stream_closed",
            Self::DecisionSourceFailure => "decision_source_failure",
            Self::TransportFailure => "transport_failure",
        };
        f.write_str(name)
    }
}

/// Turn loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingBanner,
    Running,
    Finished(EndReason),
}

/// Lifecycle of the game process connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Active,
    Ended,
}

/// One observe-decide-send iteration, as known before the command is sent.
///
/// Built at the start of an iteration and dropped once its records are
/// written; the loop keeps no transcript beyond the history buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// 1-based, strictly increasing, never reused.
    pub number: u32,
    /// Recent output window given to the decision source.
    pub recent_output: String,
    pub banner: BannerInfo,
    pub state: GameState,
    /// Raw decision response, explanation lines included.
    pub response: String,
    pub command: String,
}
