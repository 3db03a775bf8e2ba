//! Deterministic decision source for local runs without a network.

use anyhow::{Result, bail};

use crate::error::DecisionSourceError;
use crate::io::prompt::DecisionContext;
use crate::policy::PolicyOracle;

/// Built-in sequence: each response is a command followed by a short reason.
pub const DEFAULT_RESPONSES: [&str; 5] = [
    "look\nI want to see the surroundings.",
    "north\nMove toward the house to explore.",
    "take lamp\nPick up the lamp to illuminate dark rooms.",
    "open mailbox\nMaybe there's a letter inside.",
    "south\nReturn toward the southern path.",
];

/// Cycles through a fixed list of canned responses, ignoring the context.
#[derive(Debug, Clone)]
pub struct CyclingPolicy {
    responses: Vec<String>,
    cursor: usize,
}

impl Default for CyclingPolicy {
    fn default() -> Self {
        Self {
            responses: DEFAULT_RESPONSES.iter().map(|r| r.to_string()).collect(),
            cursor: 0,
        }
    }
}

impl CyclingPolicy {
    pub fn new(responses: Vec<String>) -> Result<Self> {
        if responses.is_empty() {
            bail!("cycling policy needs at least one response");
        }
        Ok(Self {
            responses,
            cursor: 0,
        })
    }

    /// Configured responses, or the built-in sequence when none are given.
    pub fn from_config(responses: &[String]) -> Result<Self> {
        if responses.is_empty() {
            return Ok(Self::default());
        }
        Self::new(responses.to_vec())
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl PolicyOracle for CyclingPolicy {
    fn decide(&mut self, _context: &DecisionContext) -> Result<String, DecisionSourceError> {
        let response = self.responses[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.responses.len();
        Ok(response)
    }
}
