//! Stable exit codes for textplay CLI commands.

use crate::core::types::EndReason;

/// Run reached its turn limit or the game closed its output, or command succeeded.
pub const OK: i32 = 0;
/// Invalid config, unreadable file, or other setup error.
pub const INVALID: i32 = 1;
/// The decision source failed or returned no usable command.
pub const DECISION_SOURCE_FAILURE: i32 = 2;
/// The game could not be started or a command could not be sent.
pub const TRANSPORT_FAILURE: i32 = 3;
/// The game produced no output before the startup timeout.
pub const TIMEOUT: i32 = 4;

pub fn for_end_reason(reason: EndReason) -> i32 {
    match reason {
        EndReason::Normal | EndReason::StreamClosed => OK,
        EndReason::Timeout => TIMEOUT,
        EndReason::DecisionSourceFailure => DECISION_SOURCE_FAILURE,
        EndReason::TransportFailure => TRANSPORT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_endings_exit_zero() {
        assert_eq!(for_end_reason(EndReason::Normal), OK);
        assert_eq!(for_end_reason(EndReason::StreamClosed), OK);
        assert_eq!(for_end_reason(EndReason::Timeout), TIMEOUT);
        assert_eq!(
            for_end_reason(EndReason::DecisionSourceFailure),
            DECISION_SOURCE_FAILURE
        );
    }
}
