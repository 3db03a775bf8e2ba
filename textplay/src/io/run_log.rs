//! Run artifacts: transcript, commands file, JSONL turn records, and the
//! optional plain-text log.
//!
//! Every record is fully built and serialized before a single write, so a
//! failure never leaves a partial line behind.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::core::extract::GameState;
use crate::core::types::Turn;

pub const TRANSCRIPT_FILE: &str = "transcript_agent.txt";
pub const COMMANDS_FILE: &str = "commands_agent.txt";
pub const RECORDS_FILE: &str = "agent_run_log.jsonl";
pub const TEXT_LOG_FILE: &str = "agent_run_log.txt";

/// Shape of the per-turn records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Pre-send and full post-receive JSON records.
    Full,
    /// Pre-send and `{timestamp, turn, command, result}` post-receive records.
    Compact,
    /// No JSON records; a readable block per turn in the text log.
    PlainText,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreSendRecord<'a> {
    pub timestamp: String,
    pub turn: u32,
    pub phase: &'static str,
    pub llm_response_raw: &'a str,
    pub command: &'a str,
    pub location: Option<&'a str>,
    pub score: Option<i64>,
    pub turns: Option<u64>,
    pub recent_output: &'a str,
    pub room: Option<&'a str>,
    pub room_description: &'a str,
    pub inventory: &'a [String],
    pub use_mock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostRecvRecord<'a> {
    pub timestamp: String,
    pub turn: u32,
    pub phase: &'static str,
    pub command: &'a str,
    pub game_output: &'a str,
    pub location: Option<&'a str>,
    pub score: Option<i64>,
    pub turns: Option<u64>,
    pub room: Option<&'a str>,
    pub room_description: &'a str,
    pub inventory: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactRecord<'a> {
    pub timestamp: String,
    pub turn: u32,
    pub command: &'a str,
    pub result: &'a str,
}

impl<'a> PreSendRecord<'a> {
    pub fn new(turn: &'a Turn, use_mock: bool) -> Self {
        Self {
            timestamp: timestamp(),
            turn: turn.number,
            phase: "before_send",
            llm_response_raw: &turn.response,
            command: &turn.command,
            location: turn.banner.location.as_deref(),
            score: turn.banner.score,
            turns: turn.banner.turns,
            recent_output: &turn.recent_output,
            room: turn.state.room.as_deref(),
            room_description: &turn.state.description,
            inventory: &turn.state.inventory,
            use_mock,
        }
    }
}

impl<'a> PostRecvRecord<'a> {
    /// Location and score come from the pre-send banner; room fields from `post_state`.
    pub fn new(turn: &'a Turn, game_output: &'a str, post_state: &'a GameState) -> Self {
        Self {
            timestamp: timestamp(),
            turn: turn.number,
            phase: "after_recv",
            command: &turn.command,
            game_output,
            location: turn.banner.location.as_deref(),
            score: turn.banner.score,
            turns: turn.banner.turns,
            room: post_state.room.as_deref(),
            room_description: &post_state.description,
            inventory: &post_state.inventory,
        }
    }
}

/// RFC 3339 UTC with microseconds, e.g. `2024-05-01T12:00:00.000000Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Resolved artifact paths under a log directory.
#[derive(Debug, Clone)]
pub struct RunLogPaths {
    pub dir: PathBuf,
    pub transcript_path: PathBuf,
    pub commands_path: PathBuf,
    pub records_path: PathBuf,
    pub text_path: PathBuf,
}

impl RunLogPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            transcript_path: dir.join(TRANSCRIPT_FILE),
            commands_path: dir.join(COMMANDS_FILE),
            records_path: dir.join(RECORDS_FILE),
            text_path: dir.join(TEXT_LOG_FILE),
        }
    }
}

/// Append-only sinks for one run. Handles close when the log is dropped.
pub struct RunLog<W: Write> {
    pub transcript: W,
    pub commands: W,
    pub records: W,
    pub text: Option<W>,
    mode: RecordMode,
}

impl RunLog<File> {
    /// Open (append) every artifact under `paths.dir`; the text log only in plain-text mode.
    pub fn open(paths: &RunLogPaths, mode: RecordMode) -> Result<Self> {
        fs::create_dir_all(&paths.dir)
            .with_context(|| format!("create log dir {}", paths.dir.display()))?;
        let text = match mode {
            RecordMode::PlainText => Some(open_append(&paths.text_path)?),
            RecordMode::Full | RecordMode::Compact => None,
        };
        Ok(Self::new(
            open_append(&paths.transcript_path)?,
            open_append(&paths.commands_path)?,
            open_append(&paths.records_path)?,
            text,
            mode,
        ))
    }
}

impl<W: Write> RunLog<W> {
    pub fn new(transcript: W, commands: W, records: W, text: Option<W>, mode: RecordMode) -> Self {
        Self {
            transcript,
            commands,
            records,
            text,
            mode,
        }
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    pub fn write_transcript(&mut self, output: &str) -> Result<()> {
        self.transcript
            .write_all(format!("{output}\n").as_bytes())
            .context("write transcript")
    }

    pub fn write_command(&mut self, command: &str) -> Result<()> {
        self.commands
            .write_all(format!("{command}\n").as_bytes())
            .context("write commands file")
    }

    /// Write the pre-send record. Returns the JSON line, or `None` in plain-text mode.
    pub fn write_pre_send(&mut self, turn: &Turn, use_mock: bool) -> Result<Option<String>> {
        match self.mode {
            RecordMode::PlainText => Ok(None),
            RecordMode::Full | RecordMode::Compact => {
                self.write_record(&PreSendRecord::new(turn, use_mock)).map(Some)
            }
        }
    }

    /// Write the post-receive record in the configured shape.
    ///
    /// Returns the JSON line, or `None` in plain-text mode.
    pub fn write_post_recv(
        &mut self,
        turn: &Turn,
        game_output: &str,
        post_state: &GameState,
    ) -> Result<Option<String>> {
        match self.mode {
            RecordMode::Full => self
                .write_record(&PostRecvRecord::new(turn, game_output, post_state))
                .map(Some),
            RecordMode::Compact => self
                .write_record(&CompactRecord {
                    timestamp: timestamp(),
                    turn: turn.number,
                    command: &turn.command,
                    result: game_output,
                })
                .map(Some),
            RecordMode::PlainText => {
                let block = format!(
                    "Turn {}\nLLM Response: {}\nCommand: {}\nResult:\n{}\n---\n",
                    turn.number,
                    turn.response.trim(),
                    turn.command,
                    game_output.trim()
                );
                if let Some(text) = self.text.as_mut() {
                    text.write_all(block.as_bytes()).context("write text log")?;
                }
                Ok(None)
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transcript.flush().context("flush transcript")?;
        self.commands.flush().context("flush commands file")?;
        self.records.flush().context("flush records")?;
        if let Some(text) = self.text.as_mut() {
            text.flush().context("flush text log")?;
        }
        Ok(())
    }

    fn write_record<T: Serialize>(&mut self, record: &T) -> Result<String> {
        let line = serde_json::to_string(record).context("serialize record")?;
        self.records
            .write_all(format!("{line}\n").as_bytes())
            .context("write record")?;
        Ok(line)
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::{BannerInfo, extract_game_state};
    use serde_json::Value;

    fn sample_turn() -> Turn {
        Turn {
            number: 2,
            recent_output: "West of House\nScore: 0 Turns: 1".to_string(),
            banner: BannerInfo {
                location: Some("West of House".to_string()),
                score: Some(0),
                turns: Some(1),
            },
            state: GameState {
                room: Some("West of House".to_string()),
                description: String::new(),
                inventory: Vec::new(),
            },
            response: "open mailbox\nMaybe there's a letter inside.".to_string(),
            command: "open mailbox".to_string(),
        }
    }

    fn memory_log(mode: RecordMode) -> RunLog<Vec<u8>> {
        RunLog::new(Vec::new(), Vec::new(), Vec::new(), Some(Vec::new()), mode)
    }

    fn records(log: &RunLog<Vec<u8>>) -> Vec<Value> {
        String::from_utf8_lossy(&log.records)
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn run_log_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        assert!(paths.transcript_path.ends_with("transcript_agent.txt"));
        assert!(paths.commands_path.ends_with("commands_agent.txt"));
        assert!(paths.records_path.ends_with("agent_run_log.jsonl"));
        assert!(paths.text_path.ends_with("agent_run_log.txt"));
    }

    #[test]
    fn full_mode_writes_pre_and_post_records() {
        let mut log = memory_log(RecordMode::Full);
        let turn = sample_turn();
        let post = extract_game_state("Opening the mailbox reveals a leaflet.\nScore: 0 Turns: 2\n");

        log.write_pre_send(&turn, true).expect("pre").expect("line");
        log.write_post_recv(&turn, "Opening the mailbox reveals a leaflet.", &post)
            .expect("post")
            .expect("line");

        let records = records(&log);
        assert_eq!(records.len(), 2);
        let pre = &records[0];
        assert_eq!(pre["phase"], "before_send");
        assert_eq!(pre["turn"], 2);
        assert_eq!(pre["command"], "open mailbox");
        assert_eq!(pre["llm_response_raw"], "open mailbox\nMaybe there's a letter inside.");
        assert_eq!(pre["location"], "West of House");
        assert_eq!(pre["score"], 0);
        assert_eq!(pre["room_description"], "");
        assert_eq!(pre["inventory"], Value::Array(Vec::new()));
        assert_eq!(pre["use_mock"], true);
        assert!(pre["timestamp"].as_str().expect("timestamp").ends_with('Z'));

        let post = &records[1];
        assert_eq!(post["phase"], "after_recv");
        assert_eq!(post["game_output"], "Opening the mailbox reveals a leaflet.");
        assert_eq!(post["room"], "Opening the mailbox reveals a leaflet.");
        assert_eq!(post["turns"], 1);
    }

    #[test]
    fn unset_banner_fields_serialize_as_null() {
        let mut log = memory_log(RecordMode::Full);
        let mut turn = sample_turn();
        turn.banner = BannerInfo::default();
        log.write_pre_send(&turn, false).expect("pre");
        let pre = &records(&log)[0];
        assert_eq!(pre["score"], Value::Null);
        assert_eq!(pre["location"], Value::Null);
    }

    #[test]
    fn compact_mode_writes_minimal_post_record() {
        let mut log = memory_log(RecordMode::Compact);
        let turn = sample_turn();
        log.write_post_recv(&turn, "Taken.", &GameState::default())
            .expect("post");
        let records = records(&log);
        let object = records[0].as_object().expect("object");
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["command", "result", "timestamp", "turn"]);
        assert_eq!(object["result"], "Taken.");
    }

    #[test]
    fn plain_text_mode_writes_no_json() {
        let mut log = memory_log(RecordMode::PlainText);
        let turn = sample_turn();
        assert_eq!(log.write_pre_send(&turn, false).expect("pre"), None);
        assert_eq!(
            log.write_post_recv(&turn, "  Taken.\n", &GameState::default())
                .expect("post"),
            None
        );
        assert!(log.records.is_empty());
        let text = String::from_utf8(log.text.take().expect("text")).expect("utf8");
        assert_eq!(
            text,
            "Turn 2\nLLM Response: open mailbox\nMaybe there's a letter inside.\nCommand: open mailbox\nResult:\nTaken.\n---\n"
        );
    }

    #[test]
    fn open_appends_to_existing_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(&temp.path().join("logs"));
        for command in ["look", "north"] {
            let mut log = RunLog::open(&paths, RecordMode::Full).expect("open");
            log.write_command(command).expect("command");
            log.flush().expect("flush");
        }
        let commands = fs::read_to_string(&paths.commands_path).expect("read");
        assert_eq!(commands, "look\nnorth\n");
        assert!(!paths.text_path.exists());
    }

    #[test]
    fn plain_text_mode_opens_the_text_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        let log = RunLog::open(&paths, RecordMode::PlainText).expect("open");
        assert_eq!(log.mode(), RecordMode::PlainText);
        assert!(log.text.is_some());
        assert!(paths.text_path.exists());
    }
}
