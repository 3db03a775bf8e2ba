//! Test-only helpers: a scripted transport, failing policies, and in-memory logs.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::{DecisionSourceError, TransportError};
use crate::io::config::RunConfig;
use crate::io::process::{Boundary, Transport};
use crate::io::prompt::DecisionContext;
use crate::io::run_log::{RecordMode, RunLog, RunLogPaths};
use crate::policy::{CyclingPolicy, PolicyOracle};

/// Boundary that matched the default `Score:` marker.
pub fn matched(text: &str) -> Boundary {
    Boundary::Matched {
        text: text.to_string(),
        marker: "Score:".to_string(),
    }
}

pub fn timed_out(text: &str) -> Boundary {
    Boundary::TimedOut {
        text: text.to_string(),
    }
}

pub fn ended(text: &str) -> Boundary {
    Boundary::StreamEnded {
        text: text.to_string(),
    }
}

/// Startup banner plus one matched response per turn, with increasing turn counts.
pub fn game_script(turns: u32) -> Vec<Boundary> {
    let mut script = vec![matched("West of House\nScore: 0 Turns: 0\n")];
    script.extend(
        (1..=turns).map(|turn| matched(&format!("West of House\nScore: 0 Turns: {turn}\n"))),
    );
    script
}

/// Replays queued boundaries and records every line sent.
///
/// Once the script runs out, waits report a closed stream.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    boundaries: VecDeque<Boundary>,
    pub sent: Vec<String>,
    pub waits: Vec<Duration>,
    pub closed: bool,
    /// 1-based send number that fails with a broken pipe.
    pub fail_send_at: Option<usize>,
}

impl ScriptedTransport {
    pub fn new(boundaries: Vec<Boundary>) -> Self {
        Self {
            boundaries: boundaries.into(),
            ..Self::default()
        }
    }

    pub fn failing_send_at(mut self, send: usize) -> Self {
        self.fail_send_at = Some(send);
        self
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, line: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.fail_send_at == Some(self.sent.len() + 1) {
            return Err(TransportError::Send(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        self.sent.push(line.to_string());
        Ok(())
    }

    fn await_boundary(&mut self, _markers: &[String], timeout: Duration) -> Boundary {
        self.waits.push(timeout);
        self.boundaries.pop_front().unwrap_or_else(|| ended(""))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Wraps a cycling policy and fails on one call; keeps every context it saw.
#[derive(Debug)]
pub struct FailingPolicy {
    inner: CyclingPolicy,
    fail_on_call: usize,
    pub contexts: Vec<DecisionContext>,
}

impl FailingPolicy {
    /// `fail_on_call` is 1-based.
    pub fn new(fail_on_call: usize) -> Self {
        Self {
            inner: CyclingPolicy::default(),
            fail_on_call,
            contexts: Vec::new(),
        }
    }
}

impl PolicyOracle for FailingPolicy {
    fn decide(&mut self, context: &DecisionContext) -> Result<String, DecisionSourceError> {
        self.contexts.push(context.clone());
        if self.contexts.len() == self.fail_on_call {
            return Err(DecisionSourceError::Unavailable(
                "scripted failure".to_string(),
            ));
        }
        self.inner.decide(context)
    }
}

/// Mock-mode config with `max_turns` and short timeouts.
pub fn mock_config(max_turns: u32) -> RunConfig {
    let mut config = RunConfig {
        max_turns,
        ..RunConfig::default()
    };
    config.policy.mock = true;
    config.game.startup_timeout_secs = 2;
    config.game.turn_timeout_secs = 1;
    config
}

pub fn memory_log(mode: RecordMode) -> RunLog<Vec<u8>> {
    let text = match mode {
        RecordMode::PlainText => Some(Vec::new()),
        RecordMode::Full | RecordMode::Compact => None,
    };
    RunLog::new(Vec::new(), Vec::new(), Vec::new(), text, mode)
}

/// Parse every JSONL record written to an in-memory log.
pub fn json_records(log: &RunLog<Vec<u8>>) -> Vec<Value> {
    String::from_utf8_lossy(&log.records)
        .lines()
        .map(|line| serde_json::from_str(line).expect("record is valid json"))
        .collect()
}

/// Records with the given `phase` (`before_send` or `after_recv`).
pub fn records_in_phase(log: &RunLog<Vec<u8>>, phase: &str) -> Vec<Value> {
    json_records(log)
        .into_iter()
        .filter(|record| record["phase"] == phase)
        .collect()
}

pub fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Fresh temp directory with file-backed run log paths.
pub fn temp_log_dir() -> Result<(TempDir, RunLogPaths)> {
    let dir = tempfile::tempdir().context("create temp log dir")?;
    let paths = RunLogPaths::new(dir.path());
    Ok((dir, paths))
}
