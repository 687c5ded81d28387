use zinject_version::Stability;

use crate::model::{Cpu, FeedPreferences, FeedUri, Implementation, ImplementationSelection, Requirements};

/// One implementation considered for one interface during a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionCandidate {
    pub feed_uri: FeedUri,
    pub implementation: Implementation,
    pub user_stability: Stability,
    /// Present locally, so usable without a download
    pub is_cached: bool,
    notes: Option<String>,
}

impl SelectionCandidate {
    pub fn new(
        feed_uri: FeedUri,
        feed_preferences: &FeedPreferences,
        implementation: Implementation,
        requirements: &Requirements,
        is_cached: bool,
        offline_uncached: bool,
    ) -> Self {
        let user_stability = feed_preferences.user_stability(&implementation.id);
        let mut candidate = Self {
            feed_uri,
            implementation,
            user_stability,
            is_cached,
            notes: None,
        };
        candidate.notes = candidate.check_suitability(requirements, offline_uncached);
        candidate
    }

    fn check_suitability(&self, requirements: &Requirements, offline_uncached: bool) -> Option<String> {
        let implementation = &self.implementation;
        let stability = self.effective_stability();

        if implementation.architecture.cpu == Cpu::Source && requirements.architecture.cpu != Cpu::Source {
            Some("This is a source implementation".to_string())
        } else if !implementation.architecture.is_compatible(&requirements.architecture) {
            Some("Incompatible architecture".to_string())
        } else if !self.matches_language(requirements) {
            Some("Wrong language".to_string())
        } else if !requirements
            .own_restriction()
            .map_or(true, |range| range.matches(&implementation.version))
        {
            Some("Incompatible with restrictions".to_string())
        } else if stability == Stability::Buggy {
            Some("Marked as buggy".to_string())
        } else if stability == Stability::Insecure {
            Some("Marked as insecure".to_string())
        } else if let Some(command) = requirements
            .command_name()
            .filter(|name| implementation.command(name).is_none())
        {
            Some(format!("Does not provide command {}", command))
        } else if offline_uncached {
            Some("Not cached and network use is offline".to_string())
        } else {
            None
        }
    }

    /// Implementations without declared languages work for any language
    pub fn matches_language(&self, requirements: &Requirements) -> bool {
        requirements.languages.is_empty()
            || self.implementation.languages.is_empty()
            || self
                .implementation
                .languages
                .iter()
                .any(|l| requirements.languages.contains(l))
    }

    pub fn is_suitable(&self) -> bool {
        self.notes.is_none()
    }

    /// Why the candidate is unsuitable
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// The user's rating when set, else the feed's
    pub fn effective_stability(&self) -> Stability {
        if self.user_stability != Stability::Unset {
            self.user_stability
        } else {
            self.implementation.stability
        }
    }

    pub fn id(&self) -> &str {
        &self.implementation.id
    }

    /// Deep copy of the implementation as selected for `requirements`
    pub fn to_selection(&self, requirements: &Requirements) -> ImplementationSelection {
        let implementation = &self.implementation;
        let os = requirements.os();

        let mut selection = ImplementationSelection::new(
            requirements.interface_uri.clone(),
            implementation.id.clone(),
            implementation.version.clone(),
        );
        if self.feed_uri != requirements.interface_uri {
            selection.from_feed = Some(self.feed_uri.clone());
        }
        selection.architecture = implementation.architecture;
        selection.stability = self.effective_stability();
        selection.released = implementation.released;
        selection.license = implementation.license.clone();
        selection.local_path = implementation.local_path.clone();
        selection.manifest_digest = implementation.manifest_digest.clone();
        if let Some(ref native) = implementation.native {
            selection.distribution = Some(native.distribution.clone());
            selection.package = Some(native.package.clone());
            selection.quick_test_file = native.quick_test_file.clone();
        }

        selection.bindings = implementation.bindings.clone();
        selection.dependencies = implementation.dependencies_for(os).cloned().collect();
        selection.restrictions = implementation.restrictions_for(os).cloned().collect();

        if let Some(command) = requirements.command_name().and_then(|name| implementation.command(name)) {
            selection.commands.push(command.filtered_for(os));
        }

        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Architecture, Command, Dependency, Os, Restriction};
    use zinject_version::{ImplementationVersion, VersionRange};

    fn uri(s: &str) -> FeedUri {
        FeedUri::parse(s).unwrap()
    }

    fn implementation(id: &str, version: &str) -> Implementation {
        let mut implementation = Implementation::new(id, ImplementationVersion::parse(version).unwrap());
        implementation.commands.push(Command::new("run").with_path("app"));
        implementation
    }

    fn requirements() -> Requirements {
        Requirements::new(uri("http://test/app.xml"))
            .with_command("run")
            .with_architecture(Architecture::new(Os::Linux, Cpu::X64))
    }

    fn candidate(implementation: Implementation, requirements: &Requirements) -> SelectionCandidate {
        SelectionCandidate::new(
            uri("http://test/app.xml"),
            &FeedPreferences::default(),
            implementation,
            requirements,
            false,
            false,
        )
    }

    #[test]
    fn test_suitable() {
        let c = candidate(implementation("a1", "1.0"), &requirements());
        assert!(c.is_suitable());
        assert_eq!(c.notes(), None);
    }

    #[test]
    fn test_source_not_suitable_for_binary_request() {
        let mut i = implementation("a1", "1.0");
        i.architecture = Architecture::new(Os::All, Cpu::Source);
        let c = candidate(i, &requirements());
        assert_eq!(c.notes(), Some("This is a source implementation"));
    }

    #[test]
    fn test_incompatible_architecture() {
        let mut i = implementation("a1", "1.0");
        i.architecture = Architecture::new(Os::Windows, Cpu::All);
        assert_eq!(candidate(i, &requirements()).notes(), Some("Incompatible architecture"));
    }

    #[test]
    fn test_wrong_language() {
        let mut i = implementation("a1", "1.0");
        i.languages.insert("de".to_string());
        let c = candidate(i, &requirements().with_language("fr"));
        assert_eq!(c.notes(), Some("Wrong language"));
    }

    #[test]
    fn test_version_restriction() {
        let r = requirements().with_restriction(uri("http://test/app.xml"), VersionRange::parse("2..").unwrap());
        let c = candidate(implementation("a1", "1.0"), &r);
        assert_eq!(c.notes(), Some("Incompatible with restrictions"));
    }

    #[test]
    fn test_user_stability_overrides_feed() {
        let mut prefs = FeedPreferences::default();
        prefs.set_user_stability("a1", Stability::Buggy);
        let c = SelectionCandidate::new(
            uri("http://test/app.xml"),
            &prefs,
            implementation("a1", "1.0"),
            &requirements(),
            false,
            false,
        );
        assert_eq!(c.effective_stability(), Stability::Buggy);
        assert_eq!(c.notes(), Some("Marked as buggy"));
    }

    #[test]
    fn test_insecure() {
        let mut i = implementation("a1", "1.0");
        i.stability = Stability::Insecure;
        assert_eq!(candidate(i, &requirements()).notes(), Some("Marked as insecure"));
    }

    #[test]
    fn test_missing_command() {
        let c = candidate(implementation("a1", "1.0"), &requirements().with_command("test"));
        assert_eq!(c.notes(), Some("Does not provide command test"));

        let no_command = candidate(implementation("a1", "1.0"), &requirements().with_command(""));
        assert!(no_command.is_suitable());
    }

    #[test]
    fn test_offline_uncached() {
        let c = SelectionCandidate::new(
            uri("http://test/app.xml"),
            &FeedPreferences::default(),
            implementation("a1", "1.0"),
            &requirements(),
            false,
            true,
        );
        assert_eq!(c.notes(), Some("Not cached and network use is offline"));
    }

    #[test]
    fn test_to_selection_copies_and_filters() {
        let mut i = implementation("a1", "1.0");
        let mut windows_dep = Dependency::new(uri("http://test/win.xml"));
        windows_dep.restriction.os = Os::Windows;
        i.dependencies.push(windows_dep);
        i.dependencies.push(Dependency::new(uri("http://test/lib.xml")));
        i.restrictions.push(Restriction::new(uri("http://test/other.xml")));
        i.commands.push(Command::new("test"));

        let c = SelectionCandidate::new(
            uri("http://test/app-extra.xml"),
            &FeedPreferences::default(),
            i,
            &requirements(),
            true,
            false,
        );
        let selection = c.to_selection(&requirements());

        assert_eq!(selection.interface, uri("http://test/app.xml"));
        assert_eq!(selection.from_feed, Some(uri("http://test/app-extra.xml")));
        assert_eq!(selection.dependencies.len(), 1);
        assert_eq!(selection.restrictions.len(), 1);
        assert_eq!(selection.commands.len(), 1);
        assert_eq!(selection.commands[0].name, "run");
    }
}
