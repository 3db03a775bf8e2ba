//! Run configuration: TOML file, then environment overrides, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::history::DEFAULT_HISTORY_CAPACITY;
use crate::io::run_log::RecordMode;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "textplay.toml";

/// Everything a run needs, passed explicitly to the turn loop.
///
/// Missing fields default to values that drive Zork I through the `fic`
/// interpreter with a remote chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum number of turns before the run finishes normally.
    pub max_turns: u32,

    /// Echo every JSON record to stdout as `LOG: <json>`.
    pub verbose: bool,

    pub game: GameConfig,
    pub context: ContextConfig,
    pub policy: PolicyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Program and arguments used to spawn the game.
    pub command: Vec<String>,

    /// Substrings the game reprints every turn; used as output boundaries.
    pub markers: Vec<String>,

    pub startup_timeout_secs: u64,
    pub turn_timeout_secs: u64,

    /// Extra wait for the rest of a marker's line, in milliseconds.
    pub marker_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextConfig {
    /// Output chunks retained in the rolling history.
    pub history_capacity: usize,
    /// Chunks scanned for location and score.
    pub banner_window: usize,
    /// Chunks included verbatim in the prompt.
    pub prompt_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Use the deterministic cycling policy instead of the remote endpoint.
    pub mock: bool,

    /// Full chat-completions URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: String,

    /// Sent only when set; deployment-scoped endpoints do not need it.
    pub model: Option<String>,

    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,

    /// Canned responses for mock mode. Empty means the built-in sequence.
    pub mock_responses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding transcript, commands and record files.
    pub dir: PathBuf,
    /// Write compact `{timestamp, turn, command, result}` post records.
    pub compact: bool,
    /// Write a human-readable text log instead of JSON records.
    pub plain_text: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: 200,
            verbose: false,
            game: GameConfig::default(),
            context: ContextConfig::default(),
            policy: PolicyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python3".to_string(),
                "game/fic.py".to_string(),
                "game/zork1.z3".to_string(),
                "--no-curses".to_string(),
            ],
            markers: vec!["Score:".to_string()],
            startup_timeout_secs: 30,
            turn_timeout_secs: 20,
            marker_settle_ms: 250,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            banner_window: 4,
            prompt_window: 6,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mock: false,
            endpoint: None,
            api_key: None,
            api_key_header: "api-key".to_string(),
            model: None,
            max_tokens: 256,
            temperature: 0.6,
            request_timeout_secs: 30,
            mock_responses: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            compact: false,
            plain_text: false,
        }
    }
}

impl GameConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn marker_settle(&self) -> Duration {
        Duration::from_millis(self.marker_settle_ms)
    }
}

impl PolicyConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl LogConfig {
    /// Plain text wins over compact when both are set.
    pub fn record_mode(&self) -> RecordMode {
        if self.plain_text {
            RecordMode::PlainText
        } else if self.compact {
            RecordMode::Compact
        } else {
            RecordMode::Full
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.game.command.is_empty() || self.game.command[0].trim().is_empty() {
            return Err(anyhow!("game.command must be a non-empty array"));
        }
        if self.game.markers.is_empty() || self.game.markers.iter().any(String::is_empty) {
            return Err(anyhow!("game.markers must be non-empty strings"));
        }
        if self.game.startup_timeout_secs == 0 || self.game.turn_timeout_secs == 0 {
            return Err(anyhow!("game timeouts must be > 0"));
        }
        if self.context.history_capacity == 0 {
            return Err(anyhow!("context.history_capacity must be > 0"));
        }
        if self.context.banner_window == 0 || self.context.prompt_window == 0 {
            return Err(anyhow!("context windows must be > 0"));
        }
        if self.policy.request_timeout_secs == 0 {
            return Err(anyhow!("policy.request_timeout_secs must be > 0"));
        }
        let missing_remote = self.policy.endpoint.as_deref().is_none_or(str::is_empty)
            || self.policy.api_key.as_deref().is_none_or(str::is_empty);
        if !self.policy.mock && missing_remote {
            return Err(anyhow!(
                "set AZURE_URL and AZURE_KEY (or policy.endpoint and policy.api_key), \
                 or set MOCK_LLM=1 for local testing"
            ));
        }
        Ok(())
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    ///
    /// `AZURE_URL`, `AZURE_KEY` (`MOCK` enables mock mode), `MOCK_LLM=1`,
    /// `MAX_TURNS`, `VERBOSE=1`, `SIMPLE_LOG=1`, `SIMPLE_TEXT=1`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| lookup(name).is_some_and(|v| v == "1");

        if let Some(url) = lookup("AZURE_URL") {
            self.policy.endpoint = Some(url);
        }
        if let Some(key) = lookup("AZURE_KEY") {
            if key == "MOCK" {
                self.policy.mock = true;
            }
            self.policy.api_key = Some(key);
        }
        if flag("MOCK_LLM") {
            self.policy.mock = true;
        }
        if let Some(raw) = lookup("MAX_TURNS") {
            self.max_turns = raw
                .trim()
                .parse()
                .with_context(|| format!("parse MAX_TURNS={raw}"))?;
        }
        if flag("VERBOSE") {
            self.verbose = true;
        }
        if flag("SIMPLE_LOG") {
            self.log.compact = true;
        }
        if flag("SIMPLE_TEXT") {
            self.log.plain_text = true;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunConfig::default()`. Validation is left
/// to the caller because environment and CLI overrides come after loading.
pub fn load_config(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunConfig) -> Result<()> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
