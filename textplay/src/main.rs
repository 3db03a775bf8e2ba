//! Automated text-game player.
//!
//! Spawns the game, asks a decision source for one command per turn, and
//! records the transcript, commands, and per-turn records in the log directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use textplay::core::extract::{extract_banner, extract_game_state};
use textplay::exit_codes;
use textplay::io::config::{DEFAULT_CONFIG_FILE, RunConfig, load_config, write_config};
use textplay::io::process::GameProcess;
use textplay::io::run_log::{RunLog, RunLogPaths};
use textplay::logging;
use textplay::policy::remote::RemoteSettings;
use textplay::policy::{CyclingPolicy, PolicyOracle, RemotePolicy};
use textplay::session::{TurnEvent, TurnLoop};

#[derive(Parser)]
#[command(
    name = "textplay",
    version,
    about = "Plays interactive text games with a language-model decision source"
)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent against the game.
    Play(PlayArgs),
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print banner and game-state extraction of a text file as JSON.
    Inspect {
        /// Captured game output.
        file: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct PlayArgs {
    /// Stop after this many turns.
    #[arg(long)]
    max_turns: Option<u32>,

    /// Use the built-in cycling responses instead of the remote endpoint.
    #[arg(long)]
    mock: bool,

    /// Echo every JSON record to stdout.
    #[arg(short, long)]
    verbose: bool,

    /// Directory for transcript, commands and records.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Game command, after `--`.
    #[arg(last = true)]
    game: Vec<String>,
}

impl PlayArgs {
    fn apply(self, config: &mut RunConfig) {
        if let Some(max_turns) = self.max_turns {
            config.max_turns = max_turns;
        }
        if self.mock {
            config.policy.mock = true;
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(dir) = self.log_dir {
            config.log.dir = dir;
        }
        if !self.game.is_empty() {
            config.game.command = self.game;
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Play(args) => cmd_play(&cli.config, args),
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Inspect { file } => cmd_inspect(&file),
    }
}

fn cmd_play(config_path: &Path, args: PlayArgs) -> Result<i32> {
    let mut config = load_config(config_path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    args.apply(&mut config);
    config.validate()?;

    let mut policy = build_policy(&config)?;
    let paths = RunLogPaths::new(&config.log.dir);
    let mut log = RunLog::open(&paths, config.log.record_mode())?;

    println!("Spawning: {}", config.game.command.join(" "));
    let mut game = match GameProcess::start(&config.game.command) {
        Ok(game) => game.with_marker_settle(config.game.marker_settle()),
        Err(err) => {
            eprintln!("{:#}", anyhow::Error::new(err));
            return Ok(exit_codes::TRANSPORT_FAILURE);
        }
    };
    info!(
        log_dir = %paths.dir.display(),
        max_turns = config.max_turns,
        mock = config.policy.mock,
        record_mode = ?log.mode(),
        "session started"
    );

    let verbose = config.verbose;
    let outcome = TurnLoop::new(&config, &mut game, &mut policy, &mut log)?
        .run(|event| print_event(event, verbose))?;

    println!("{}", outcome.reason.status_line());
    Ok(exit_codes::for_end_reason(outcome.reason))
}

fn build_policy(config: &RunConfig) -> Result<Box<dyn PolicyOracle>> {
    if config.policy.mock {
        println!("Running in MOCK LLM mode");
        return Ok(Box::new(CyclingPolicy::from_config(
            &config.policy.mock_responses,
        )?));
    }
    let settings = RemoteSettings::from_config(&config.policy)?;
    Ok(Box::new(RemotePolicy::new(settings)?))
}

fn print_event(event: &TurnEvent<'_>, verbose: bool) {
    match event {
        TurnEvent::Banner { text } => println!("{}", text.trim_end()),
        TurnEvent::Decided { turn, command } => println!("[{turn}] LLM -> {command}"),
        TurnEvent::Received {
            output, timed_out, ..
        } => {
            if *timed_out {
                println!("Timeout waiting for game response after command");
            }
            println!("{}", output.trim_end());
        }
        TurnEvent::Record { line } if verbose => println!("LOG: {line}"),
        TurnEvent::Record { .. } => {}
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if !force && path.exists() {
        eprintln!(
            "{} already exists; use --force to overwrite",
            path.display()
        );
        return Ok(exit_codes::OK);
    }
    write_config(path, &RunConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_inspect(file: &Path) -> Result<i32> {
    let text = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let report = json!({
        "banner": extract_banner(&text),
        "state": extract_game_state(&text),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize inspect report")?
    );
    Ok(exit_codes::OK)
}
