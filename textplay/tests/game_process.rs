//! Transport tests against a real child process.
//!
//! A small `sh` script stands in for the game: it prints a status line after
//! each command it reads.

#![cfg(unix)]

use std::time::{Duration, Instant};

use textplay::core::types::SessionState;
use textplay::error::TransportError;
use textplay::io::process::{Boundary, GameProcess, Transport};

const ECHO_GAME: &str = r#"
echo "West of House"
echo "Score: 0 Turns: 0"
turns=0
while read -r cmd; do
  turns=$((turns + 1))
  echo "You typed: $cmd"
  echo "Score: 0 Turns: $turns"
done
"#;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn markers() -> Vec<String> {
    vec!["Score:".to_string()]
}

#[test]
fn banner_and_turns_end_at_status_line() {
    let mut game = GameProcess::start(&sh(ECHO_GAME)).expect("spawn");
    assert_eq!(game.state(), SessionState::Starting);

    let banner = game.await_boundary(&markers(), Duration::from_secs(5));
    assert_eq!(
        banner,
        Boundary::Matched {
            text: "West of House\nScore: 0 Turns: 0\n".to_string(),
            marker: "Score:".to_string(),
        }
    );
    assert_eq!(game.state(), SessionState::Active);

    game.send("open mailbox").expect("send");
    let reply = game.await_boundary(&markers(), Duration::from_secs(5));
    assert_eq!(reply.text(), "You typed: open mailbox\nScore: 0 Turns: 1\n");

    game.close();
    assert_eq!(game.state(), SessionState::Ended);
    assert!(matches!(game.send("look"), Err(TransportError::Closed)));
}

#[test]
fn silent_game_times_out_with_partial_text() {
    let mut game =
        GameProcess::start(&sh("printf 'Loading...'; sleep 5")).expect("spawn");

    let started = Instant::now();
    let boundary = game.await_boundary(&markers(), Duration::from_millis(300));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(
        boundary,
        Boundary::TimedOut {
            text: "Loading...".to_string()
        }
    );
    game.close();
}

#[test]
fn character_split_across_a_timeout_is_kept_whole() {
    let mut game = GameProcess::start(&sh(r"printf 'caf\303'; sleep 1; printf '\251 Score: 1\n'; sleep 5"))
        .expect("spawn");

    let first = game.await_boundary(&markers(), Duration::from_millis(400));
    assert_eq!(
        first,
        Boundary::TimedOut {
            text: "caf".to_string()
        }
    );
    let second = game.await_boundary(&markers(), Duration::from_secs(5));
    assert_eq!(second.text(), "\u{e9} Score: 1\n");
    assert_eq!(format!("{}{}", first.text(), second.text()), "caf\u{e9} Score: 1\n");
    game.close();
}

#[test]
fn partial_output_marks_the_session_active() {
    let mut game =
        GameProcess::start(&sh("printf 'Loading...'; sleep 5")).expect("spawn");
    let boundary = game.await_boundary(&markers(), Duration::from_millis(300));
    assert!(matches!(boundary, Boundary::TimedOut { .. }));
    assert_eq!(game.state(), SessionState::Active);
    game.close();
}

#[test]
fn exit_reports_stream_ended() {
    let mut game = GameProcess::start(&sh("echo 'Goodbye'")).expect("spawn");
    let boundary = game.await_boundary(&markers(), Duration::from_secs(5));
    assert_eq!(
        boundary,
        Boundary::StreamEnded {
            text: "Goodbye\n".to_string()
        }
    );
}

#[test]
fn marker_without_newline_settles_then_matches() {
    let mut game = GameProcess::start(&sh("printf 'Score: 5'; sleep 5"))
        .expect("spawn")
        .with_marker_settle(Duration::from_millis(50));
    let boundary = game.await_boundary(&markers(), Duration::from_secs(3));
    assert_eq!(boundary.text(), "Score: 5");
    assert!(matches!(boundary, Boundary::Matched { .. }));
    game.close();
}

#[test]
fn missing_program_is_a_spawn_error() {
    let command = vec!["textplay-no-such-game-binary".to_string()];
    assert!(matches!(
        GameProcess::start(&command),
        Err(TransportError::Spawn { .. })
    ));
}

#[test]
fn empty_command_is_rejected() {
    assert!(matches!(
        GameProcess::start(&[]),
        Err(TransportError::EmptyCommand)
    ));
}
