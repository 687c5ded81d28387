use super::cancel::CancellationToken;
use super::candidate::SelectionCandidate;
use super::provider::CandidateProvider;
use super::stack::SelectionStack;
use crate::error::{Result, SolverError};
use crate::model::{Binding, Command, Dependency, FeedUri, Os, Requirements, Selections};

/// How a pass ended when no hard error occurred.
#[derive(Debug)]
pub(crate) enum PassOutcome {
    Solved(Selections),
    /// Every candidate was exhausted; carries the first command cycle seen
    Unsatisfied { cycle: Option<String> },
}

/// Which element a dependency list belongs to
enum DependencyOwner {
    Implementation(usize),
    Command(usize, String),
}

impl DependencyOwner {
    /// Selection index and, for commands, the command name
    fn location(&self) -> (usize, Option<&str>) {
        match self {
            DependencyOwner::Implementation(index) => (*index, None),
            DependencyOwner::Command(index, name) => (*index, Some(name.as_str())),
        }
    }
}

/// State of one attempt at solving one effective requirements variant.
///
/// A pass never outlives its invocation's provider; a failed or cancelled
/// pass is dropped as a whole.
pub(crate) struct Pass<'p, 'a> {
    top_level: Requirements,
    provider: &'p mut CandidateProvider<'a>,
    cancellation: &'p CancellationToken,
    stack: SelectionStack,
    /// `(interface, command)` pairs whose commands are being solved
    commands_in_progress: Vec<(FeedUri, String)>,
    cycle: Option<String>,
}

impl<'p, 'a> Pass<'p, 'a> {
    pub fn new(
        requirements: Requirements,
        provider: &'p mut CandidateProvider<'a>,
        cancellation: &'p CancellationToken,
    ) -> Self {
        let stack = SelectionStack::new(requirements.interface_uri.clone());
        Self {
            top_level: requirements,
            provider,
            cancellation,
            stack,
            commands_in_progress: Vec::new(),
            cycle: None,
        }
    }

    pub fn run(mut self) -> Result<PassOutcome> {
        let requirements = self.top_level.clone();
        if self.try_to_solve(&requirements)? {
            debug_assert!(self.stack.is_consistent());
            Ok(PassOutcome::Solved(self.stack.into_selections()))
        } else {
            Ok(PassOutcome::Unsatisfied { cycle: self.cycle })
        }
    }

    /// Runs one step of the search and leaves the stack in place
    #[cfg(test)]
    pub(crate) fn solve_step(&mut self, requirements: &Requirements) -> Result<bool> {
        self.try_to_solve(requirements)
    }

    #[cfg(test)]
    pub(crate) fn stack(&self) -> &SelectionStack {
        &self.stack
    }

    /// Satisfies `requirements` on top of the current selections
    fn try_to_solve(&mut self, requirements: &Requirements) -> Result<bool> {
        self.cancellation.check()?;

        let candidates = self.provider.get_sorted_candidates(requirements)?;
        let os = requirements.os();
        let suitable: Vec<SelectionCandidate> = candidates
            .into_iter()
            .filter(|c| {
                c.is_suitable()
                    && !self.conflicts_with_existing_restrictions(c, &requirements.interface_uri)
                    && !self.conflicts_with_existing_selections(c, os)
            })
            .collect();

        match self.stack.position(&requirements.interface_uri) {
            Some(index) => self.try_to_use_existing(index, requirements, &suitable),
            None => self.try_to_select_candidate(suitable, requirements),
        }
    }

    fn conflicts_with_existing_restrictions(&self, candidate: &SelectionCandidate, interface: &FeedUri) -> bool {
        let implementation = &candidate.implementation;
        self.stack.restrictions_on(interface).any(|r| {
            !r.allows_version(&implementation.version) || !r.allows_distribution(implementation.distribution())
        })
    }

    fn conflicts_with_existing_selections(&self, candidate: &SelectionCandidate, os: Os) -> bool {
        candidate.implementation.restrictions_for(os).any(|r| match self.stack.get(&r.interface) {
            Some(existing) => {
                !r.allows_version(&existing.version) || !r.allows_distribution(existing.distribution.as_deref())
            }
            None => false,
        })
    }

    /// Reuses the selection already made for the interface, adding the
    /// requested command to it when missing
    fn try_to_use_existing(
        &mut self,
        index: usize,
        requirements: &Requirements,
        suitable: &[SelectionCandidate],
    ) -> Result<bool> {
        let Some(selection) = self.stack.get_index(index).cloned() else {
            return Ok(false);
        };

        let still_suitable = suitable
            .iter()
            .any(|c| c.id() == selection.id && &c.feed_uri == selection.feed());
        if !still_suitable {
            log::debug!(
                "Existing selection {} for {} conflicts with new requirements",
                selection.id,
                selection.interface
            );
            return Err(SolverError::too_complex());
        }

        let Some(command_name) = requirements.command_name() else {
            return Ok(true);
        };
        if selection.has_command(command_name) {
            return Ok(true);
        }

        let command = self
            .provider
            .lookup_original_implementation(&selection)?
            .and_then(|implementation| implementation.command(command_name).map(|c| c.filtered_for(requirements.os())));
        let Some(command) = command else {
            return Ok(false);
        };

        log::debug!("Adding command {} to existing selection for {}", command.name, selection.interface);
        let mark = self.stack.mark();
        if !self.stack.add_command(index, command.clone()) {
            return Ok(false);
        }

        let solved = self.try_to_solve_command(&command, requirements)?;
        if !solved {
            self.stack.rollback_to(mark);
        }
        Ok(solved)
    }

    /// Tries the candidates in order and keeps the first that works
    fn try_to_select_candidate(&mut self, candidates: Vec<SelectionCandidate>, requirements: &Requirements) -> Result<bool> {
        for candidate in candidates {
            let mark = self.stack.mark();
            log::debug!(
                "Trying {} version {} for {}",
                candidate.id(),
                candidate.implementation.version,
                requirements.interface_uri
            );

            let index = self.stack.commit(candidate.to_selection(requirements));
            if self.try_candidate(index, requirements)? {
                return Ok(true);
            }

            self.stack.rollback_to(mark);
            debug_assert!(self.stack.is_consistent());
        }

        log::debug!("No usable candidate for {}", requirements.interface_uri);
        Ok(false)
    }

    fn try_candidate(&mut self, index: usize, requirements: &Requirements) -> Result<bool> {
        if !self.try_to_solve_dependencies(&DependencyOwner::Implementation(index))? {
            return Ok(false);
        }

        let command = requirements
            .command_name()
            .and_then(|name| self.stack.get_index(index).and_then(|s| s.command(name)).cloned());
        if let Some(command) = command {
            if !self.try_to_solve_command(&command, requirements)? {
                return Ok(false);
            }
        }

        let Some((interface, bindings)) = self
            .stack
            .get_index(index)
            .map(|s| (s.interface.clone(), s.bindings.clone()))
        else {
            return Ok(false);
        };
        self.try_to_solve_bindings(&interface, &bindings)
    }

    /// Essential dependencies first, all of which must succeed; then
    /// recommended ones, which are dropped when they fail
    fn try_to_solve_dependencies(&mut self, owner: &DependencyOwner) -> Result<bool> {
        let dependencies = self.dependencies_of(owner).cloned().unwrap_or_default();

        for dependency in dependencies.iter().filter(|d| d.is_essential()) {
            if !self.try_to_solve_dependency(dependency)? {
                log::debug!("Essential dependency on {} failed", dependency.interface());
                return Ok(false);
            }
        }

        for dependency in dependencies.iter().filter(|d| !d.is_essential()) {
            let mark = self.stack.mark();
            if !self.try_to_solve_dependency(dependency)? {
                log::debug!("Dropping recommended dependency on {}", dependency.interface());
                self.stack.rollback_to(mark);
                let (index, command) = owner.location();
                self.stack.remove_dependency(index, command, dependency);
            }
        }

        Ok(true)
    }

    fn dependencies_of(&self, owner: &DependencyOwner) -> Option<&Vec<Dependency>> {
        match owner {
            DependencyOwner::Implementation(index) => self.stack.get_index(*index).map(|s| &s.dependencies),
            DependencyOwner::Command(index, name) => self
                .stack
                .get_index(*index)
                .and_then(|s| s.command(name))
                .map(|c| &c.dependencies),
        }
    }

    fn try_to_solve_dependency(&mut self, dependency: &Dependency) -> Result<bool> {
        let requirements = self.top_level.for_dependency(dependency);
        Ok(self.try_to_solve(&requirements)? && self.try_to_solve_bindings(dependency.interface(), &dependency.bindings)?)
    }

    /// Solves the commands that executable bindings on `interface` refer to
    fn try_to_solve_bindings(&mut self, interface: &FeedUri, bindings: &[Binding]) -> Result<bool> {
        for requirements in self.top_level.for_bindings(interface, bindings) {
            if !self.try_to_solve(&requirements)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn try_to_solve_command(&mut self, command: &Command, requirements: &Requirements) -> Result<bool> {
        if let Some(binding) = command.bindings.iter().find(|b| b.is_executable()) {
            return Err(SolverError::Unsupported(format!(
                "<{}> not supported in <command>",
                binding.element_name()
            )));
        }

        self.commands_in_progress
            .push((requirements.interface_uri.clone(), command.name.clone()));
        let result = self.try_to_solve_command_parts(command, requirements);
        self.commands_in_progress.pop();
        result
    }

    fn try_to_solve_command_parts(&mut self, command: &Command, requirements: &Requirements) -> Result<bool> {
        if let Some(ref runner) = command.runner {
            let runner_requirements = self.top_level.for_runner(runner);
            if self.detect_cycle(&runner_requirements) {
                return Ok(false);
            }
            if !self.try_to_solve(&runner_requirements)? {
                return Ok(false);
            }
            if !self.try_to_solve_bindings(runner.interface(), &runner.bindings)? {
                return Ok(false);
            }
        }

        if !self.try_to_solve_bindings(&requirements.interface_uri, &command.bindings)? {
            return Ok(false);
        }

        match self.stack.position(&requirements.interface_uri) {
            Some(index) => self.try_to_solve_dependencies(&DependencyOwner::Command(index, command.name.clone())),
            None => Ok(true),
        }
    }

    /// True when `runner` asks for a command that is itself being solved
    fn detect_cycle(&mut self, runner: &Requirements) -> bool {
        let Some(command) = runner.command_name() else {
            return false;
        };
        let Some(start) = self
            .commands_in_progress
            .iter()
            .position(|(interface, name)| interface == &runner.interface_uri && name == command)
        else {
            return false;
        };

        let chain = self.commands_in_progress[start..]
            .iter()
            .chain(std::iter::once(&self.commands_in_progress[start]))
            .map(|(interface, name)| format!("{} ({})", interface, name))
            .collect::<Vec<_>>()
            .join(" -> ");
        log::debug!("Command cycle: {}", chain);
        self.cycle.get_or_insert(chain);
        true
    }
}
