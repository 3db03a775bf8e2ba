//! Typed failures surfaced by the transport and the decision source.
//!
//! Boundary timeouts and stream closure are not errors; they are variants of
//! [`crate::io::process::Boundary`].

use thiserror::Error;

/// Failure to start or write to the game process. Always fatal to a run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("game {0} was not piped")]
    NotPiped(&'static str),
    #[error("failed to send command to game: {0}")]
    Send(#[source] std::io::Error),
    #[error("game command is empty")]
    EmptyCommand,
    #[error("game session is closed")]
    Closed,
}

/// The decision source failed or returned unusable data. Fatal, never retried.
#[derive(Debug, Error)]
pub enum DecisionSourceError {
    #[error("decision request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("decision endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decision response was not valid json: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("decision response has no completion text")]
    MissingCompletion,
    #[error("decision source unavailable: {0}")]
    Unavailable(String),
}

/// The decision source answered, but no line of the answer held a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no command could be extracted from the decision response")]
pub struct NoCommandExtracted;
