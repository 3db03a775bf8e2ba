//! Decision sources: whatever supplies the next command for a turn.
//!
//! The turn loop depends only on [`PolicyOracle`]; it never inspects which
//! variant is active.

use crate::error::DecisionSourceError;
use crate::io::prompt::DecisionContext;

pub mod cycling;
pub mod remote;

pub use cycling::CyclingPolicy;
pub use remote::RemotePolicy;

/// Produce the next raw response for a turn.
pub trait PolicyOracle {
    /// Return the raw response text; the command is its first non-empty line.
    fn decide(&mut self, context: &DecisionContext) -> Result<String, DecisionSourceError>;
}

impl<P: PolicyOracle + ?Sized> PolicyOracle for Box<P> {
    fn decide(&mut self, context: &DecisionContext) -> Result<String, DecisionSourceError> {
        (**self).decide(context)
    }
}
