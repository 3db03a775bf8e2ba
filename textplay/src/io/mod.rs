//! I/O helpers for the agent: game process, prompts, run artifacts, config.

pub mod config;
pub mod process;
pub mod prompt;
pub mod run_log;
