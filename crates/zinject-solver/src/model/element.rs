use serde::{Deserialize, Serialize};
use zinject_version::{Constraint, ImplementationVersion, VersionRange};

use super::architecture::Os;
use super::uri::FeedUri;

/// Distribution name standing for implementations that are not native packages
pub const ZEROINSTALL_DISTRIBUTION: &str = "0install";

fn is_any_os(os: &Os) -> bool {
    *os == Os::All
}

/// A version/distribution limit placed on another interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Restriction {
    pub interface: FeedUri,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRange>,

    /// Legacy `not-before`/`before` pairs, intersected with `version`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,

    /// Only applies on this OS
    #[serde(default, skip_serializing_if = "is_any_os")]
    pub os: Os,

    /// Allowed distributions; empty means any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<String>,
}

impl Restriction {
    pub fn new(interface: FeedUri) -> Self {
        Self {
            interface,
            version: None,
            constraints: Vec::new(),
            os: Os::All,
            distributions: Vec::new(),
        }
    }

    pub fn with_version(mut self, range: VersionRange) -> Self {
        self.version = Some(range);
        self
    }

    /// The version range after applying all legacy constraints, `None` when unrestricted
    pub fn effective_versions(&self) -> Option<VersionRange> {
        if self.version.is_none() && self.constraints.is_empty() {
            return None;
        }

        let mut range = self.version.clone().unwrap_or_default();
        for constraint in &self.constraints {
            range = range.intersect(constraint);
        }
        Some(range)
    }

    pub fn allows_version(&self, version: &ImplementationVersion) -> bool {
        self.effective_versions().map_or(true, |range| range.matches(version))
    }

    /// `distribution` is `None` for regular (non-native) implementations
    pub fn allows_distribution(&self, distribution: Option<&str>) -> bool {
        if self.distributions.is_empty() {
            return true;
        }
        let name = distribution.unwrap_or(ZEROINSTALL_DISTRIBUTION);
        self.distributions.iter().any(|d| d == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Essential,
    Recommended,
}

/// A `requires` element: a restriction that must also be selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dependency {
    #[serde(flatten)]
    pub restriction: Restriction,

    #[serde(default)]
    pub importance: Importance,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Dependency {
    pub fn new(interface: FeedUri) -> Self {
        Self {
            restriction: Restriction::new(interface),
            importance: Importance::Essential,
            bindings: Vec::new(),
        }
    }

    pub fn interface(&self) -> &FeedUri {
        &self.restriction.interface
    }

    pub fn is_essential(&self) -> bool {
        self.importance == Importance::Essential
    }
}

/// The interpreter a command is run with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Runner {
    #[serde(flatten)]
    pub restriction: Restriction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Runner {
    pub fn new(interface: FeedUri) -> Self {
        Self {
            restriction: Restriction::new(interface),
            command: None,
            arguments: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn interface(&self) -> &FeedUri {
        &self.restriction.interface
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    #[default]
    Prepend,
    Append,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvironmentBinding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<String>,
    #[serde(default)]
    pub mode: EnvironmentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OverlayBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutableBinding {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GenericBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// How a selected implementation is made available to the program using it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Binding {
    Environment(EnvironmentBinding),
    Overlay(OverlayBinding),
    ExecutableInVar(ExecutableBinding),
    ExecutableInPath(ExecutableBinding),
    Generic(GenericBinding),
}

impl Binding {
    pub fn element_name(&self) -> &'static str {
        match self {
            Binding::Environment(_) => "environment",
            Binding::Overlay(_) => "overlay",
            Binding::ExecutableInVar(_) => "executable-in-var",
            Binding::ExecutableInPath(_) => "executable-in-path",
            Binding::Generic(_) => "binding",
        }
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, Binding::ExecutableInVar(_) | Binding::ExecutableInPath(_))
    }

    /// The command an executable binding needs, defaulting to `run`
    pub fn required_command(&self) -> Option<&str> {
        match self {
            Binding::ExecutableInVar(b) | Binding::ExecutableInPath(b) => {
                Some(b.command.as_deref().unwrap_or(super::COMMAND_RUN))
            }
            _ => None,
        }
    }
}

/// A named entry point of an implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Command {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<Runner>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            arguments: Vec::new(),
            working_dir: None,
            runner: None,
            dependencies: Vec::new(),
            restrictions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Copy keeping only dependencies and restrictions that apply on `os`
    pub fn filtered_for(&self, os: Os) -> Command {
        let mut command = self.clone();
        command.dependencies.retain(|d| d.restriction.os.is_compatible(os));
        command.restrictions.retain(|r| r.os.is_compatible(os));
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> FeedUri {
        FeedUri::parse(s).unwrap()
    }

    fn v(s: &str) -> ImplementationVersion {
        ImplementationVersion::parse(s).unwrap()
    }

    #[test]
    fn test_effective_versions() {
        let mut restriction = Restriction::new(uri("http://test/lib.xml"));
        assert!(restriction.effective_versions().is_none());
        assert!(restriction.allows_version(&v("9")));

        restriction.version = Some(VersionRange::parse("1..!3").unwrap());
        restriction.constraints.push(Constraint::new(None, Some(v("2"))));
        let effective = restriction.effective_versions().unwrap();
        assert_eq!(effective.to_string(), "1..!2");
        assert!(restriction.allows_version(&v("1.5")));
        assert!(!restriction.allows_version(&v("2.5")));
    }

    #[test]
    fn test_allows_distribution() {
        let mut restriction = Restriction::new(uri("http://test/lib.xml"));
        assert!(restriction.allows_distribution(None));
        assert!(restriction.allows_distribution(Some("Debian")));

        restriction.distributions = vec!["Debian".to_string()];
        assert!(restriction.allows_distribution(Some("Debian")));
        assert!(!restriction.allows_distribution(Some("RPM")));
        assert!(!restriction.allows_distribution(None));

        restriction.distributions.push(ZEROINSTALL_DISTRIBUTION.to_string());
        assert!(restriction.allows_distribution(None));
    }

    #[test]
    fn test_dependency_json() {
        let json = r#"{"interface": "http://test/lib.xml", "version": "1..!2", "importance": "recommended",
            "bindings": [{"type": "environment", "name": "LIB", "insert": "lib"}]}"#;
        let dep: Dependency = serde_json::from_str(json).unwrap();
        assert_eq!(dep.interface().as_str(), "http://test/lib.xml");
        assert!(!dep.is_essential());
        assert_eq!(dep.bindings.len(), 1);
        assert_eq!(dep.restriction.version.as_ref().unwrap().to_string(), "1..!2");
    }

    #[test]
    fn test_executable_binding_command() {
        let binding: Binding =
            serde_json::from_str(r#"{"type": "executable-in-path", "name": "tool"}"#).unwrap();
        assert!(binding.is_executable());
        assert_eq!(binding.required_command(), Some("run"));
        assert_eq!(binding.element_name(), "executable-in-path");

        let env: Binding = serde_json::from_str(r#"{"type": "environment", "name": "X", "value": "1"}"#).unwrap();
        assert!(!env.is_executable());
        assert_eq!(env.required_command(), None);
    }

    #[test]
    fn test_command_filtered_for_os() {
        let mut windows_only = Dependency::new(uri("http://test/win.xml"));
        windows_only.restriction.os = Os::Windows;
        let mut command = Command::new("run");
        command.dependencies.push(windows_only);
        command.dependencies.push(Dependency::new(uri("http://test/any.xml")));

        assert_eq!(command.filtered_for(Os::Linux).dependencies.len(), 1);
        assert_eq!(command.filtered_for(Os::Windows).dependencies.len(), 2);
    }
}
