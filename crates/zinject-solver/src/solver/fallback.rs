use super::Solver;
use crate::error::Result;
use crate::model::{Requirements, Selections};

/// Tries a primary solver and falls back to a secondary one.
///
/// When the secondary fails at the transport level, including a `fail`
/// reply, the primary's error is reported.
pub struct FallbackSolver<'a> {
    primary: Box<dyn Solver + 'a>,
    secondary: Box<dyn Solver + 'a>,
}

impl<'a> FallbackSolver<'a> {
    pub fn new(primary: Box<dyn Solver + 'a>, secondary: Box<dyn Solver + 'a>) -> Self {
        Self { primary, secondary }
    }
}

impl Solver for FallbackSolver<'_> {
    fn solve(&self, requirements: &Requirements) -> Result<Selections> {
        let primary_error = match self.primary.solve(requirements) {
            Ok(selections) => return Ok(selections),
            Err(e) if !e.allows_fallback() => return Err(e),
            Err(e) => e,
        };

        log::info!("Primary solver failed ({}), trying fallback solver", primary_error);
        match self.secondary.solve(requirements) {
            Ok(selections) => Ok(selections),
            Err(secondary_error) if secondary_error.is_network_error() => {
                log::debug!("Fallback solver unavailable: {}", secondary_error);
                Err(primary_error)
            }
            Err(secondary_error) => Err(secondary_error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use crate::model::FeedUri;
    use std::cell::Cell;
    use std::io;

    struct FakeSolver {
        result: fn() -> Result<Selections>,
        calls: Cell<usize>,
    }

    impl FakeSolver {
        fn new(result: fn() -> Result<Selections>) -> Self {
            Self { result, calls: Cell::new(0) }
        }
    }

    impl Solver for &FakeSolver {
        fn solve(&self, _requirements: &Requirements) -> Result<Selections> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    fn uri() -> FeedUri {
        FeedUri::parse("http://test/app.xml").unwrap()
    }

    fn solved() -> Result<Selections> {
        Ok(Selections::new(uri()))
    }

    fn unsatisfiable() -> Result<Selections> {
        Err(SolverError::no_solution())
    }

    fn unreachable_backend() -> Result<Selections> {
        Err(SolverError::Io(io::Error::new(io::ErrorKind::NotFound, "no such program")))
    }

    fn remote_failure() -> Result<Selections> {
        Err(SolverError::Remote("feed signature invalid".to_string()))
    }

    fn feed_failure() -> Result<Selections> {
        Err(SolverError::feed("http://test/lib.xml", "signature invalid"))
    }

    fn cancelled() -> Result<Selections> {
        Err(SolverError::Cancelled)
    }

    fn run(primary: &FakeSolver, secondary: &FakeSolver) -> Result<Selections> {
        FallbackSolver::new(Box::new(primary), Box::new(secondary)).solve(&Requirements::new(uri()))
    }

    #[test]
    fn test_primary_success_skips_secondary() {
        let primary = FakeSolver::new(solved);
        let secondary = FakeSolver::new(solved);
        assert!(run(&primary, &secondary).is_ok());
        assert_eq!(secondary.calls.get(), 0);
    }

    #[test]
    fn test_secondary_used_on_failure() {
        let primary = FakeSolver::new(unsatisfiable);
        let secondary = FakeSolver::new(solved);
        assert!(run(&primary, &secondary).is_ok());
        assert_eq!(primary.calls.get(), 1);
        assert_eq!(secondary.calls.get(), 1);
    }

    #[test]
    fn test_primary_error_kept_when_secondary_unreachable() {
        let primary = FakeSolver::new(unsatisfiable);
        let secondary = FakeSolver::new(unreachable_backend);
        let err = run(&primary, &secondary).unwrap_err();
        assert_eq!(err.to_string(), "No solution found");
    }

    #[test]
    fn test_primary_error_kept_when_secondary_reports_failure() {
        let primary = FakeSolver::new(unsatisfiable);
        let secondary = FakeSolver::new(remote_failure);
        let err = run(&primary, &secondary).unwrap_err();
        assert_eq!(err.to_string(), "No solution found");
        assert_eq!(secondary.calls.get(), 1);
    }

    #[test]
    fn test_secondary_error_reported_otherwise() {
        let primary = FakeSolver::new(unsatisfiable);
        let secondary = FakeSolver::new(feed_failure);
        let err = run(&primary, &secondary).unwrap_err();
        assert!(matches!(err, SolverError::Feed { .. }));
    }

    #[test]
    fn test_cancellation_is_not_retried() {
        let primary = FakeSolver::new(cancelled);
        let secondary = FakeSolver::new(solved);
        assert!(matches!(run(&primary, &secondary), Err(SolverError::Cancelled)));
        assert_eq!(secondary.calls.get(), 0);
    }
}
