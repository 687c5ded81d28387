use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zinject_version::VersionRange;

use super::architecture::{Architecture, Cpu, Os};
use super::element::{Binding, Dependency, Runner};
use super::uri::FeedUri;
use super::{COMMAND_COMPILE, COMMAND_RUN};

/// What a solve step is looking for.
///
/// Requirements are never changed once a search step uses them; each edge of
/// the dependency graph derives a fresh value from the top-level requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Requirements {
    pub interface_uri: FeedUri,

    /// `None` (or empty) when no command is needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub architecture: Architecture,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_restrictions: IndexMap<FeedUri, VersionRange>,

    /// Allowed native distributions; empty means any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<String>,
}

impl Requirements {
    pub fn new(interface_uri: FeedUri) -> Self {
        Self {
            interface_uri,
            command: None,
            architecture: Architecture::default(),
            languages: BTreeSet::new(),
            extra_restrictions: IndexMap::new(),
            distributions: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.insert(language.into());
        self
    }

    pub fn with_restriction(mut self, interface: FeedUri, range: VersionRange) -> Self {
        self.add_restriction(interface, range);
        self
    }

    /// Narrows the acceptable versions of `interface`
    pub fn add_restriction(&mut self, interface: FeedUri, range: VersionRange) -> &mut Self {
        let merged = match self.extra_restrictions.get(&interface) {
            Some(existing) => existing.intersect_range(&range),
            None => range,
        };
        self.extra_restrictions.insert(interface, merged);
        self
    }

    /// The command to look for, `None` when the step needs no command
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.is_empty())
    }

    /// The extra restriction for this step's own interface
    pub fn own_restriction(&self) -> Option<&VersionRange> {
        self.extra_restrictions.get(&self.interface_uri)
    }

    fn derived(&self, interface_uri: FeedUri, command: Option<String>) -> Requirements {
        Requirements {
            interface_uri,
            command,
            architecture: self.architecture,
            languages: self.languages.clone(),
            extra_restrictions: self.extra_restrictions.clone(),
            distributions: Vec::new(),
        }
    }

    /// Requirements for solving a dependency of an implementation selected under `self`
    pub fn for_dependency(&self, dependency: &Dependency) -> Requirements {
        let mut requirements = self.derived(dependency.interface().clone(), None);
        requirements.distributions = dependency.restriction.distributions.clone();
        if let Some(range) = dependency.restriction.effective_versions() {
            requirements.add_restriction(dependency.interface().clone(), range);
        }
        requirements
    }

    /// Requirements for solving the runner of a command
    pub fn for_runner(&self, runner: &Runner) -> Requirements {
        let command = runner.command.clone().unwrap_or_else(|| COMMAND_RUN.to_string());
        let mut requirements = self.derived(runner.interface().clone(), Some(command));
        requirements.distributions = runner.restriction.distributions.clone();
        if let Some(range) = runner.restriction.effective_versions() {
            requirements.add_restriction(runner.interface().clone(), range);
        }
        requirements
    }

    /// Requirements for the commands executable bindings on `interface` need
    pub fn for_bindings(&self, interface: &FeedUri, bindings: &[Binding]) -> Vec<Requirements> {
        bindings
            .iter()
            .filter_map(|b| b.required_command())
            .map(|command| self.derived(interface.clone(), Some(command.to_string())))
            .collect()
    }

    /// Expands wildcards into concrete variants to try in order.
    ///
    /// The command defaults to `compile` for source requests and `run`
    /// otherwise; wildcard OS/CPU become the host's. A 64-bit CPU adds a
    /// second variant asking for the matching 32-bit CPU.
    pub fn effective(&self, host: &Architecture) -> Vec<Requirements> {
        let mut effective = self.clone();
        if effective.command.is_none() {
            let default = if self.architecture.cpu == Cpu::Source {
                COMMAND_COMPILE
            } else {
                COMMAND_RUN
            };
            effective.command = Some(default.to_string());
        }
        effective.architecture = self.architecture.resolve_against(host);

        match effective.architecture.cpu.compat_32bit() {
            Some(cpu_32) => {
                let mut compat = effective.clone();
                compat.architecture = Architecture::new(effective.architecture.os, cpu_32);
                vec![effective, compat]
            }
            None => vec![effective],
        }
    }

    pub fn os(&self) -> Os {
        self.architecture.os
    }
}
