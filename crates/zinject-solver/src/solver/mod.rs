//! Dependency solving.
//!
//! [`BacktrackingSolver`] searches the feed graph in process: for every
//! interface it tries candidates in [`CandidatePolicy`] order, commits the
//! first that works together with its restrictions, and rolls back when a
//! dependency, command or binding below it cannot be satisfied.
//! [`FallbackSolver`] composes two backends, typically the backtracking
//! solver and [`ExternalSolver`](crate::external::ExternalSolver).

mod backtracking;
mod cancel;
mod candidate;
mod fallback;
mod pass;
mod policy;
mod provider;
mod stack;


pub use backtracking::BacktrackingSolver;
pub use cancel::CancellationToken;
pub use candidate::SelectionCandidate;
pub use fallback::FallbackSolver;
pub use policy::CandidatePolicy;
pub use provider::CandidateProvider;

use crate::error::Result;
use crate::model::{Requirements, Selections};

/// Computes selections for a set of requirements.
pub trait Solver {
    fn solve(&self, requirements: &Requirements) -> Result<Selections>;
}
