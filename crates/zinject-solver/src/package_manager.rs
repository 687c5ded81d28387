//! Native packages offered by the host's distribution.

use std::collections::HashMap;

use crate::model::{Implementation, PackageImplementation};

/// Turns `package-implementation` placeholders into concrete native implementations.
pub trait PackageManager {
    /// Native implementations matching `package`, restricted to `distributions` when non-empty
    fn query(&self, package: &PackageImplementation, distributions: &[String]) -> Vec<Implementation>;
}

/// Package manager for hosts without native package support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPackageManager;

impl PackageManager for UnsupportedPackageManager {
    fn query(&self, package: &PackageImplementation, _distributions: &[String]) -> Vec<Implementation> {
        log::debug!("Native package lookup for {} is not supported on this platform", package.package);
        Vec::new()
    }
}

/// A fixed table of native packages by name.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageManager {
    packages: HashMap<String, Vec<Implementation>>,
}

impl StaticPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native implementation; its `native` field names the distribution
    pub fn add(&mut self, package: impl Into<String>, implementation: Implementation) -> &mut Self {
        self.packages.entry(package.into()).or_default().push(implementation);
        self
    }
}

impl PackageManager for StaticPackageManager {
    fn query(&self, package: &PackageImplementation, distributions: &[String]) -> Vec<Implementation> {
        let wanted = |implementation: &Implementation| {
            let Some(distribution) = implementation.distribution() else {
                return false;
            };
            (package.distributions.is_empty() || package.distributions.iter().any(|d| d == distribution))
                && (distributions.is_empty() || distributions.iter().any(|d| d == distribution))
        };

        self.packages
            .get(&package.package)
            .map(|found| {
                found
                    .iter()
                    .filter(|i| wanted(i))
                    .map(|i| {
                        let mut implementation = i.clone();
                        implementation.commands.extend(package.commands.iter().cloned());
                        implementation.dependencies.extend(package.dependencies.iter().cloned());
                        implementation.bindings.extend(package.bindings.iter().cloned());
                        implementation
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
