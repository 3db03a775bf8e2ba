//! Turn loop orchestration: observe, decide, send, observe, record.
//!
//! The loop owns the history buffer and the turn counter; nothing else mutates
//! them. It suspends only while waiting on the decision source and on the
//! transport's output boundary, both bounded by timeouts. Whatever path ends
//! the run, the game process is closed and the sinks are flushed.

use std::io::Write;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::core::command::extract_command;
use crate::core::extract::{BannerInfo, extract_banner, extract_game_state};
use crate::core::history::{HistoryBuffer, OutputChunk};
use crate::core::types::{EndReason, LoopState, Turn};
use crate::io::config::RunConfig;
use crate::io::process::{Boundary, Transport};
use crate::io::prompt::PromptBuilder;
use crate::io::run_log::RunLog;
use crate::policy::PolicyOracle;

/// Progress notifications for console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent<'a> {
    /// Startup output, observed before the first turn.
    Banner { text: &'a str },
    /// The decision source chose `command` for `turn`.
    Decided { turn: u32, command: &'a str },
    /// Output captured after sending the turn's command.
    Received {
        turn: u32,
        output: &'a str,
        timed_out: bool,
    },
    /// A JSON record was written.
    Record { line: &'a str },
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub reason: EndReason,
    /// Turns whose command reached the decision stage and was logged.
    pub turns_played: u32,
    /// Post-receive records written (or plain-text blocks in plain-text mode).
    pub post_records: u32,
}

/// Drives one session from the startup banner to a terminal state.
pub struct TurnLoop<'a, T: Transport, P: PolicyOracle, W: Write> {
    config: &'a RunConfig,
    transport: &'a mut T,
    policy: &'a mut P,
    log: &'a mut RunLog<W>,
    prompts: PromptBuilder,
    history: HistoryBuffer,
    state: LoopState,
}

impl<'a, T: Transport, P: PolicyOracle, W: Write> TurnLoop<'a, T, P, W> {
    pub fn new(
        config: &'a RunConfig,
        transport: &'a mut T,
        policy: &'a mut P,
        log: &'a mut RunLog<W>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            transport,
            policy,
            log,
            prompts: PromptBuilder::new()?,
            history: HistoryBuffer::new(config.context.history_capacity),
            state: LoopState::AwaitingBanner,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until the turn limit, stream closure, or a fatal failure.
    ///
    /// Sink I/O errors are returned as `Err` and leave [`Self::state`] where the
    /// failure happened; every other terminal condition is reported through
    /// [`RunOutcome::reason`]. The transport is closed and the sinks flushed on
    /// every path.
    pub fn run<F>(&mut self, mut on_event: F) -> Result<RunOutcome>
    where
        F: FnMut(&TurnEvent<'_>),
    {
        let result = self.drive(&mut on_event);
        self.transport.close();
        let flushed = self.log.flush();
        let outcome = result?;
        flushed?;
        Ok(outcome)
    }

    fn drive<F>(&mut self, on_event: &mut F) -> Result<RunOutcome>
    where
        F: FnMut(&TurnEvent<'_>),
    {
        let mut outcome = RunOutcome {
            reason: EndReason::Normal,
            turns_played: 0,
            post_records: 0,
        };
        let config = self.config;
        let game = &config.game;

        debug!("waiting for startup banner");
        let mut latest = match self
            .transport
            .await_boundary(&game.markers, game.startup_timeout())
        {
            Boundary::Matched { text, .. } => text,
            Boundary::TimedOut { text } if text.trim().is_empty() => {
                warn!("no output before the startup timeout");
                return Ok(self.finish(outcome, EndReason::Timeout));
            }
            Boundary::TimedOut { text } => {
                warn!("startup marker not seen, continuing with partial banner");
                text
            }
            Boundary::StreamEnded { text } => {
                on_event(&TurnEvent::Banner { text: &text });
                self.log.write_transcript(&text)?;
                return Ok(self.finish(outcome, EndReason::StreamClosed));
            }
        };
        on_event(&TurnEvent::Banner { text: &latest });
        self.log.write_transcript(&latest)?;
        self.state = LoopState::Running;

        for number in 1..=config.max_turns {
            let chunk = latest.trim();
            if !chunk.is_empty() {
                self.history.append(OutputChunk::new(chunk));
            }

            let context = &config.context;
            let banner = current_banner(&self.history, context.banner_window);
            let recent = self.history.joined_window(context.prompt_window);
            let state = extract_game_state(&recent);
            let prompt = self.prompts.build(&banner, &state, &recent)?;

            let response = match self.policy.decide(&prompt) {
                Ok(response) => response,
                Err(err) => {
                    error!(turn = number, err = %err, "decision source failed");
                    return Ok(self.finish(outcome, EndReason::DecisionSourceFailure));
                }
            };
            let parsed = match extract_command(&response) {
                Ok(parsed) => parsed,
                Err(err) => {
                    error!(turn = number, err = %err, "decision response had no command");
                    return Ok(self.finish(outcome, EndReason::DecisionSourceFailure));
                }
            };
            if let Some(explanation) = &parsed.explanation {
                debug!(turn = number, explanation = %explanation, "decision explanation");
            }

            let turn = Turn {
                number,
                recent_output: recent,
                banner,
                state,
                response,
                command: parsed.command,
            };
            on_event(&TurnEvent::Decided {
                turn: number,
                command: &turn.command,
            });
            self.log.write_command(&turn.command)?;
            if let Some(line) = self.log.write_pre_send(&turn, config.policy.mock)? {
                on_event(&TurnEvent::Record { line: &line });
            }
            outcome.turns_played = number;

            if let Err(err) = self.transport.send(&turn.command) {
                error!(turn = number, err = %err, "failed to send command");
                return Ok(self.finish(outcome, EndReason::TransportFailure));
            }

            match self
                .transport
                .await_boundary(&game.markers, game.turn_timeout())
            {
                Boundary::Matched { text, .. } => {
                    self.record_post(&turn, &text, &mut outcome, on_event)?;
                    latest = text;
                }
                Boundary::TimedOut { text } => {
                    // The next turn decides from this partial output without
                    // being told the previous command was only partly observed.
                    warn!(turn = number, "timed out waiting for game response after command");
                    on_event(&TurnEvent::Received {
                        turn: number,
                        output: &text,
                        timed_out: true,
                    });
                    self.log.write_transcript(&text)?;
                    latest = text;
                }
                Boundary::StreamEnded { text } => {
                    self.record_post(&turn, &text, &mut outcome, on_event)?;
                    return Ok(self.finish(outcome, EndReason::StreamClosed));
                }
            }
        }

        Ok(self.finish(outcome, EndReason::Normal))
    }

    fn record_post<F>(
        &mut self,
        turn: &Turn,
        output: &str,
        outcome: &mut RunOutcome,
        on_event: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&TurnEvent<'_>),
    {
        on_event(&TurnEvent::Received {
            turn: turn.number,
            output,
            timed_out: false,
        });
        self.log.write_transcript(output)?;
        let post_state = extract_game_state(output);
        if let Some(line) = self.log.write_post_recv(turn, output, &post_state)? {
            on_event(&TurnEvent::Record { line: &line });
        }
        outcome.post_records += 1;
        Ok(())
    }

    fn finish(&mut self, outcome: RunOutcome, reason: EndReason) -> RunOutcome {
        info!(
            reason = %reason,
            turns_played = outcome.turns_played,
            post_records = outcome.post_records,
            "run finished"
        );
        self.state = LoopState::Finished(reason);
        RunOutcome { reason, ..outcome }
    }
}

/// Location from the banner window; score and turns from the newest chunk in
/// that window that carries a status line.
fn current_banner(history: &HistoryBuffer, window: usize) -> BannerInfo {
    let mut banner = extract_banner(&history.joined_window(window));
    if let Some(status) = history
        .window(window)
        .rev()
        .map(|chunk| extract_banner(chunk.as_str()))
        .find(|status| status.score.is_some())
    {
        banner.score = status.score;
        banner.turns = status.turns;
    }
    banner
}
