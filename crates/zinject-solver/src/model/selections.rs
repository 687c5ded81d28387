//! The result of a solve: one chosen implementation per interface.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zinject_version::{ImplementationVersion, Stability};

use super::architecture::Architecture;
use super::element::{Binding, Command, Dependency, Restriction};
use super::feed::ManifestDigest;
use super::uri::FeedUri;

/// The implementation chosen for one interface, with deep copies of the
/// parts of the feed element needed to run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImplementationSelection {
    pub interface: FeedUri,

    /// Feed the implementation came from, when not the interface's own feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_feed: Option<FeedUri>,

    pub id: String,

    pub version: ImplementationVersion,

    #[serde(default)]
    pub architecture: Architecture,

    #[serde(default)]
    pub stability: Stability,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    #[serde(default, skip_serializing_if = "ManifestDigest::is_empty")]
    pub manifest_digest: ManifestDigest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_test_file: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

impl ImplementationSelection {
    pub fn new(interface: FeedUri, id: impl Into<String>, version: ImplementationVersion) -> Self {
        Self {
            interface,
            from_feed: None,
            id: id.into(),
            version,
            architecture: Architecture::default(),
            stability: Stability::Unset,
            released: None,
            license: None,
            local_path: None,
            manifest_digest: ManifestDigest::default(),
            distribution: None,
            package: None,
            quick_test_file: None,
            commands: Vec::new(),
            dependencies: Vec::new(),
            restrictions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.command(name).is_some()
    }

    /// The feed this selection was actually taken from
    pub fn feed(&self) -> &FeedUri {
        self.from_feed.as_ref().unwrap_or(&self.interface)
    }
}

/// A complete set of chosen implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Selections {
    pub interface: FeedUri,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub implementations: Vec<ImplementationSelection>,
}

impl Selections {
    pub fn new(interface: FeedUri) -> Self {
        Self {
            interface,
            command: None,
            implementations: Vec::new(),
        }
    }

    pub fn get(&self, interface: &FeedUri) -> Option<&ImplementationSelection> {
        self.implementations.iter().find(|s| &s.interface == interface)
    }

    pub fn position(&self, interface: &FeedUri) -> Option<usize> {
        self.implementations.iter().position(|s| &s.interface == interface)
    }

    pub fn contains(&self, interface: &FeedUri) -> bool {
        self.get(interface).is_some()
    }

    /// The selection for the top-level interface
    pub fn main_implementation(&self) -> Option<&ImplementationSelection> {
        self.get(&self.interface)
    }

    /// Drops restrictions, which only matter while solving
    pub fn purge_restrictions(&mut self) {
        for implementation in &mut self.implementations {
            implementation.restrictions.clear();
            for command in &mut implementation.commands {
                command.restrictions.clear();
            }
        }
    }

    /// Orders implementations by interface URI
    pub fn sort(&mut self) {
        self.implementations.sort_by(|a, b| a.interface.cmp(&b.interface));
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> FeedUri {
        FeedUri::parse(s).unwrap()
    }

    fn selection(interface: &str, id: &str) -> ImplementationSelection {
        ImplementationSelection::new(uri(interface), id, ImplementationVersion::parse("1.0").unwrap())
    }

    #[test]
    fn test_sort_and_lookup() {
        let mut selections = Selections::new(uri("http://test/b.xml"));
        selections.implementations.push(selection("http://test/b.xml", "b1"));
        selections.implementations.push(selection("http://test/a.xml", "a1"));
        selections.sort();

        assert_eq!(selections.implementations[0].id, "a1");
        assert_eq!(selections.main_implementation().unwrap().id, "b1");
        assert_eq!(selections.position(&uri("http://test/b.xml")), Some(1));
        assert!(!selections.contains(&uri("http://test/c.xml")));
    }

    #[test]
    fn test_purge_restrictions() {
        let mut selections = Selections::new(uri("http://test/a.xml"));
        let mut a = selection("http://test/a.xml", "a1");
        a.restrictions.push(Restriction::new(uri("http://test/b.xml")));
        let mut run = Command::new("run");
        run.restrictions.push(Restriction::new(uri("http://test/c.xml")));
        a.commands.push(run);
        selections.implementations.push(a);

        selections.purge_restrictions();
        assert!(selections.implementations[0].restrictions.is_empty());
        assert!(selections.implementations[0].commands[0].restrictions.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let mut selections = Selections::new(uri("http://test/a.xml"));
        selections.command = Some("run".to_string());
        let mut a = selection("http://test/a.xml", "a1");
        a.from_feed = Some(uri("http://test/a-extra.xml"));
        a.commands.push(Command::new("run").with_path("bin/a"));
        selections.implementations.push(a);

        let json = selections.to_json().unwrap();
        assert!(json.contains("\"from-feed\": \"http://test/a-extra.xml\""));
        let back: Selections = serde_json::from_str(&json).unwrap();
        assert_eq!(back, selections);
        assert_eq!(back.implementations[0].feed(), &uri("http://test/a-extra.xml"));
    }
}
