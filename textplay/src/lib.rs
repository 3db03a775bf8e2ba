//! Automated player for interactive text games.
//!
//! The agent launches a game as a child process, reads its output, asks a
//! decision source for the next command, sends it, and records every turn.
//!
//! - **[`core`]**: Pure, deterministic logic (banner and state extraction,
//!   history window, command parsing). No I/O.
//! - **[`io`]**: Side-effecting operations (game process, prompts, run
//!   artifacts, config). Behind traits where tests need to substitute them.
//! - **[`policy`]**: Decision sources, remote and deterministic.
//!
//! [`session`] coordinates all three into the turn loop.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod policy;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
