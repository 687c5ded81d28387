use std::time::Instant;

use super::cancel::CancellationToken;
use super::candidate::SelectionCandidate;
use super::pass::{Pass, PassOutcome};
use super::provider::CandidateProvider;
use super::Solver;
use crate::config::Config;
use crate::error::{Result, SolverError};
use crate::feed_manager::FeedManager;
use crate::model::{Architecture, PreferencesProvider, Requirements, Selections};
use crate::package_manager::PackageManager;
use crate::store::Store;

/// In-process solver trying candidates best first and backtracking on failure.
///
/// Each call to [`Solver::solve`] gets fresh feed and preference caches,
/// shared by the passes for its effective requirements variants.
pub struct BacktrackingSolver<'a> {
    config: &'a Config,
    feed_manager: &'a dyn FeedManager,
    store: &'a dyn Store,
    package_manager: &'a dyn PackageManager,
    preferences: &'a dyn PreferencesProvider,
    host: Architecture,
    cancellation: CancellationToken,
}

impl<'a> BacktrackingSolver<'a> {
    pub fn new(
        config: &'a Config,
        feed_manager: &'a dyn FeedManager,
        store: &'a dyn Store,
        package_manager: &'a dyn PackageManager,
        preferences: &'a dyn PreferencesProvider,
    ) -> Self {
        Self {
            config,
            feed_manager,
            store,
            package_manager,
            preferences,
            host: Architecture::current_system(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Resolve wildcard architectures against `host` instead of this machine
    pub fn with_host_architecture(mut self, host: Architecture) -> Self {
        self.host = host;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether any feed used so far was older than the freshness threshold
    pub fn is_stale(&self) -> bool {
        self.feed_manager.is_stale()
    }

    /// Ranked candidates for the first effective variant of `requirements`,
    /// unsuitable ones included
    pub fn candidates(&self, requirements: &Requirements) -> Result<Vec<SelectionCandidate>> {
        check_requirements(requirements)?;
        let mut provider = self.provider();
        match requirements.effective(&self.host).first() {
            Some(effective) => provider.get_sorted_candidates(effective),
            None => Ok(Vec::new()),
        }
    }

    fn provider(&self) -> CandidateProvider<'a> {
        CandidateProvider::new(self.config, self.feed_manager, self.store, self.package_manager, self.preferences)
    }
}

impl Solver for BacktrackingSolver<'_> {
    fn solve(&self, requirements: &Requirements) -> Result<Selections> {
        check_requirements(requirements)?;

        let start = Instant::now();
        let mut provider = self.provider();
        let mut cycle = None;

        for effective in requirements.effective(&self.host) {
            log::debug!(
                "Solving {} for {} (command {})",
                effective.interface_uri,
                effective.architecture,
                effective.command_name().unwrap_or("-")
            );

            match Pass::new(effective.clone(), &mut provider, &self.cancellation).run()? {
                PassOutcome::Solved(mut selections) => {
                    selections.interface = effective.interface_uri.clone();
                    selections.command = effective.command.clone();
                    selections.purge_restrictions();
                    selections.sort();

                    log::info!(
                        "Selected {} implementations for {} in {:.3} seconds",
                        selections.implementations.len(),
                        effective.interface_uri,
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(selections);
                }
                PassOutcome::Unsatisfied { cycle: found } => {
                    log::info!("No solution for {} on {}", effective.interface_uri, effective.architecture);
                    if cycle.is_none() {
                        cycle = found;
                    }
                }
            }
        }

        Err(match cycle {
            Some(chain) => SolverError::DependencyCycle(chain),
            None => SolverError::no_solution(),
        })
    }
}

fn check_requirements(requirements: &Requirements) -> Result<()> {
    if requirements.interface_uri.as_str().is_empty() {
        return Err(SolverError::InvalidRequirements("interface URI is empty".to_string()));
    }
    Ok(())
}
