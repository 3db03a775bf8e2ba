//! Game process transport: spawn the game, send command lines, and wait for
//! recognisable output boundaries.
//!
//! The game prints output in irregular bursts with no end-of-turn token, so a
//! recurring status marker (e.g. `Score:`) is used as the synchronization point.
//! If the marker never shows up the wait times out instead of hanging, and the
//! text buffered so far is handed back rather than dropped.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::budget::remaining_budget;
use crate::core::types::SessionState;
use crate::error::TransportError;

/// How long to wait for the rest of a marker's line once the marker is seen.
pub const DEFAULT_MARKER_SETTLE: Duration = Duration::from_millis(250);

/// Grace period for the game to exit after its stdin closes.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK_BYTES: usize = 4096;

/// Outcome of waiting for an output boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// A marker appeared; `text` runs through the end of the marker's line.
    Matched { text: String, marker: String },
    /// The game closed its output; `text` is whatever was still buffered.
    StreamEnded { text: String },
    /// The wait expired; `text` is the partial output buffered so far.
    TimedOut { text: String },
}

impl Boundary {
    pub fn text(&self) -> &str {
        match self {
            Self::Matched { text, .. } | Self::StreamEnded { text } | Self::TimedOut { text } => {
                text
            }
        }
    }
}

/// Line-oriented connection to an interactive program.
///
/// One call is outstanding at a time; implementations are driven strictly
/// sequentially by the turn loop.
pub trait Transport {
    /// Write `line` followed by a newline. No retry.
    fn send(&mut self, line: &str) -> Result<(), TransportError>;

    /// Block until one of `markers` appears, the stream closes, or `timeout` elapses.
    fn await_boundary(&mut self, markers: &[String], timeout: Duration) -> Boundary;

    /// Release the underlying process. Safe to call more than once.
    fn close(&mut self);
}

/// Bytes received from the game that have not been handed out yet.
#[derive(Debug, Default)]
struct StreamBuffer {
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkerHit {
    marker: String,
    /// Index just past the newline that ends the marker's line, if received.
    line_end: Option<usize>,
}

impl StreamBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Earliest occurrence of any non-empty marker.
    fn find_marker(&self, markers: &[String]) -> Option<MarkerHit> {
        let (pos, marker) = markers
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| {
                self.bytes
                    .windows(m.len())
                    .position(|window| window == m.as_bytes())
                    .map(|pos| (pos, m))
            })
            .min_by_key(|(pos, _)| *pos)?;
        let after = pos + marker.len();
        let line_end = self.bytes[after..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| after + offset + 1);
        Some(MarkerHit {
            marker: marker.clone(),
            line_end,
        })
    }

    fn take(&mut self, end: usize) -> String {
        let rest = self.bytes.split_off(end.min(self.bytes.len()));
        let taken = std::mem::replace(&mut self.bytes, rest);
        String::from_utf8_lossy(&taken).into_owned()
    }

    fn take_all(&mut self) -> String {
        let taken = std::mem::take(&mut self.bytes);
        String::from_utf8_lossy(&taken).into_owned()
    }

    /// Everything buffered except a trailing, not yet complete UTF-8 sequence,
    /// which stays for the next wait.
    fn take_complete(&mut self) -> String {
        let end = self.bytes.len() - incomplete_utf8_tail(&self.bytes);
        self.take(end)
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`, or 0.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for (back, &byte) in bytes.iter().rev().take(4).enumerate() {
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        let present = back + 1;
        return if present < width { present } else { 0 };
    }
    0
}

/// A spawned game process exclusively owned by one session.
///
/// Stdout is drained on a background thread into a channel so boundary waits
/// can time out; stderr is drained into `debug!` events. The process is
/// terminated when the session is closed or dropped.
pub struct GameProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: Receiver<Vec<u8>>,
    pending: StreamBuffer,
    stream_closed: bool,
    settle: Duration,
    state: SessionState,
}

impl GameProcess {
    /// Spawn `command` (program followed by its arguments) with piped stdio.
    #[instrument(skip_all, fields(program = command.first().map(String::as_str).unwrap_or("")))]
    pub fn start(command: &[String]) -> Result<Self, TransportError> {
        let (program, args) = command.split_first().ok_or(TransportError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning game process");
        let mut child = cmd.spawn().map_err(|source| {
            error!(err = %source, "failed to spawn game");
            TransportError::Spawn {
                program: program.clone(),
                source,
            }
        })?;

        let stdin = child.stdin.take().ok_or(TransportError::NotPiped("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::NotPiped("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::NotPiped("stderr"))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || forward_stream(stdout, tx));
        thread::spawn(move || log_stderr(stderr));

        info!(pid = child.id(), "game process started");
        Ok(Self {
            child,
            stdin: Some(stdin),
            output: rx,
            pending: StreamBuffer::default(),
            stream_closed: false,
            settle: DEFAULT_MARKER_SETTLE,
            state: SessionState::Starting,
        })
    }

    /// Override how long a matched marker waits for the end of its line.
    pub fn with_marker_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl Transport for GameProcess {
    fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        writeln!(stdin, "{line}")
            .and_then(|()| stdin.flush())
            .map_err(TransportError::Send)?;
        debug!(command = line, "sent command");
        Ok(())
    }

    #[instrument(skip_all, fields(timeout_ms = timeout.as_millis() as u64))]
    fn await_boundary(&mut self, markers: &[String], timeout: Duration) -> Boundary {
        let deadline = Instant::now() + timeout;
        let mut settle_deadline: Option<Instant> = None;
        loop {
            let hit = self.pending.find_marker(markers);
            match &hit {
                Some(MarkerHit {
                    marker,
                    line_end: Some(end),
                }) => {
                    return Boundary::Matched {
                        text: self.pending.take(*end),
                        marker: marker.clone(),
                    };
                }
                Some(MarkerHit { marker, .. }) if self.stream_closed => {
                    return Boundary::Matched {
                        text: self.pending.take_all(),
                        marker: marker.clone(),
                    };
                }
                Some(_) => {
                    settle_deadline.get_or_insert_with(|| (Instant::now() + self.settle).min(deadline));
                }
                None if self.stream_closed => {
                    debug!("game output stream closed");
                    return Boundary::StreamEnded {
                        text: self.pending.take_all(),
                    };
                }
                None => {}
            }

            let Some(remaining) = remaining_budget(settle_deadline.unwrap_or(deadline)) else {
                let text = self.pending.take_complete();
                return match hit {
                    Some(MarkerHit { marker, .. }) => Boundary::Matched { text, marker },
                    None => {
                        warn!(buffered_bytes = text.len(), "timed out waiting for output boundary");
                        Boundary::TimedOut { text }
                    }
                };
            };

            match self.output.recv_timeout(remaining) {
                Ok(bytes) => {
                    if self.state == SessionState::Starting {
                        self.state = SessionState::Active;
                    }
                    self.pending.extend(&bytes);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.stream_closed = true,
            }
        }
    }

    fn close(&mut self) {
        if self.state == SessionState::Ended {
            return;
        }
        self.state = SessionState::Ended;
        // Closing stdin lets a well-behaved game exit on its own.
        drop(self.stdin.take());
        match self.child.wait_timeout(CLOSE_GRACE) {
            Ok(Some(status)) => debug!(exit_code = ?status.code(), "game process exited"),
            Ok(None) => {
                warn!(
                    grace_ms = CLOSE_GRACE.as_millis() as u64,
                    "game process still running, killing"
                );
                if let Err(err) = self.child.kill() {
                    warn!(err = %err, "failed to kill game process");
                }
                if let Err(err) = self.child.wait() {
                    warn!(err = %err, "failed to reap game process");
                }
            }
            Err(err) => warn!(err = %err, "failed to wait for game process"),
        }
    }
}

impl Drop for GameProcess {
    fn drop(&mut self) {
        self.close();
    }
}

fn forward_stream<R: Read>(mut reader: R, tx: Sender<Vec<u8>>) {
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(chunk[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(err = %err, "failed to read game output");
                break;
            }
        }
    }
}

fn log_stderr<R: Read>(reader: R) {
    for line in BufReader::new(reader).lines() {
        match line {
            Ok(line) => debug!(line = %line, "game stderr"),
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["Score:".to_string()]
    }

    #[test]
    fn find_marker_extends_to_end_of_line() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"West of House\nScore: 0 Turns: 1\n>next");
        let hit = buffer.find_marker(&markers()).expect("hit");
        assert_eq!(hit.marker, "Score:");
        assert_eq!(buffer.take(hit.line_end.expect("line end")), "West of House\nScore: 0 Turns: 1\n");
        assert_eq!(buffer.take_all(), ">next");
    }

    #[test]
    fn find_marker_without_newline_has_no_line_end() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"Kitchen\nScore: 3");
        let hit = buffer.find_marker(&markers()).expect("hit");
        assert_eq!(hit.line_end, None);
    }

    #[test]
    fn find_marker_picks_earliest_marker() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"You died.\n*** GAME OVER ***\nScore: 1\n");
        let all = vec!["Score:".to_string(), "GAME OVER".to_string(), String::new()];
        let hit = buffer.find_marker(&all).expect("hit");
        assert_eq!(hit.marker, "GAME OVER");
    }

    #[test]
    fn find_marker_on_partial_marker_is_none() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"Sco");
        assert_eq!(buffer.find_marker(&markers()), None);
        buffer.extend(b"re: 9 Turns: 2\n");
        assert!(buffer.find_marker(&markers()).is_some());
    }

    #[test]
    fn boundary_text_accessors_cover_all_variants() {
        let matched = Boundary::Matched {
            text: "a".to_string(),
            marker: "Score:".to_string(),
        };
        let ended = Boundary::StreamEnded {
            text: "b".to_string(),
        };
        let timed_out = Boundary::TimedOut {
            text: "c".to_string(),
        };
        assert_eq!(matched.text(), "a");
        assert_eq!(ended.text(), "b");
        assert_eq!(timed_out.text(), "c");
    }

    #[test]
    fn take_complete_keeps_a_split_character_buffered() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"caf\xC3");
        assert_eq!(buffer.take_complete(), "caf");
        buffer.extend(b"\xA9 Score: 1\n");
        assert_eq!(buffer.take_complete(), "\u{e9} Score: 1\n");
        assert!(buffer.bytes.is_empty());
    }

    #[test]
    fn incomplete_tail_only_counts_truncated_sequences() {
        assert_eq!(incomplete_utf8_tail(b"plain"), 0);
        assert_eq!(incomplete_utf8_tail("caf\u{e9}".as_bytes()), 0);
        assert_eq!(incomplete_utf8_tail(b"\xE2\x82"), 2);
        assert_eq!(incomplete_utf8_tail(b"x\xF0\x9F\x98"), 3);
        assert_eq!(incomplete_utf8_tail(b""), 0);
    }
}
