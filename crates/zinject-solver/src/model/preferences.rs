//! User preferences overriding what feeds declare.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zinject_version::Stability;

use super::feed::FeedReference;
use super::uri::FeedUri;

/// Per-interface settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfacePreferences {
    /// Minimum stability to prefer; `unset` falls back to the global policy
    #[serde(default)]
    pub stability_policy: Stability,

    /// Extra feeds the user registered for this interface
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<FeedReference>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImplementationPreferences {
    #[serde(default)]
    pub user_stability: Stability,
}

/// Per-feed settings, keyed by implementation ID.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedPreferences {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub implementations: IndexMap<String, ImplementationPreferences>,
}

impl FeedPreferences {
    pub fn user_stability(&self, id: &str) -> Stability {
        self.implementations
            .get(id)
            .map(|p| p.user_stability)
            .unwrap_or_default()
    }

    pub fn set_user_stability(&mut self, id: impl Into<String>, stability: Stability) {
        self.implementations.entry(id.into()).or_default().user_stability = stability;
    }
}

/// Source of user preferences.
///
/// Lookups never fail: missing or unreadable preferences are defaults.
pub trait PreferencesProvider {
    fn interface_preferences(&self, interface: &FeedUri) -> InterfacePreferences;
    fn feed_preferences(&self, feed: &FeedUri) -> FeedPreferences;
}

/// Preferences held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreferences {
    interfaces: HashMap<FeedUri, InterfacePreferences>,
    feeds: HashMap<FeedUri, FeedPreferences>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_interface(&mut self, interface: FeedUri, preferences: InterfacePreferences) -> &mut Self {
        self.interfaces.insert(interface, preferences);
        self
    }

    pub fn set_feed(&mut self, feed: FeedUri, preferences: FeedPreferences) -> &mut Self {
        self.feeds.insert(feed, preferences);
        self
    }
}

impl PreferencesProvider for InMemoryPreferences {
    fn interface_preferences(&self, interface: &FeedUri) -> InterfacePreferences {
        self.interfaces.get(interface).cloned().unwrap_or_default()
    }

    fn feed_preferences(&self, feed: &FeedUri) -> FeedPreferences {
        self.feeds.get(feed).cloned().unwrap_or_default()
    }
}

/// Preferences stored as `interfaces/<escaped>.json` and `feeds/<escaped>.json`
/// below a configuration directory.
#[derive(Debug, Clone)]
pub struct DirectoryPreferences {
    root: PathBuf,
}

impl DirectoryPreferences {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn load<T: DeserializeOwned + Default>(&self, kind: &str, uri: &FeedUri) -> T {
        let path = self.root.join(kind).join(format!("{}.json", uri.escape()));
        if !path.exists() {
            return T::default();
        }

        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Ignoring corrupt preferences file {}: {}", path.display(), e);
                T::default()
            }
        }
    }
}

impl PreferencesProvider for DirectoryPreferences {
    fn interface_preferences(&self, interface: &FeedUri) -> InterfacePreferences {
        self.load("interfaces", interface)
    }

    fn feed_preferences(&self, feed: &FeedUri) -> FeedPreferences {
        self.load("feeds", feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uri(s: &str) -> FeedUri {
        FeedUri::parse(s).unwrap()
    }

    #[test]
    fn test_feed_preferences_user_stability() {
        let mut prefs = FeedPreferences::default();
        assert_eq!(prefs.user_stability("a1"), Stability::Unset);
        prefs.set_user_stability("a1", Stability::Buggy);
        assert_eq!(prefs.user_stability("a1"), Stability::Buggy);
    }

    #[test]
    fn test_in_memory_defaults() {
        let prefs = InMemoryPreferences::new();
        let app = uri("http://test/app.xml");
        assert_eq!(prefs.interface_preferences(&app), InterfacePreferences::default());
        assert_eq!(prefs.feed_preferences(&app), FeedPreferences::default());
    }

    #[test]
    fn test_directory_preferences() {
        let dir = TempDir::new().unwrap();
        let app = uri("http://test/app.xml");
        fs::create_dir_all(dir.path().join("interfaces")).unwrap();
        fs::write(
            dir.path().join("interfaces").join(format!("{}.json", app.escape())),
            r#"{"stability-policy": "testing", "feeds": [{"source": "http://test/extra.xml"}]}"#,
        )
        .unwrap();

        let prefs = DirectoryPreferences::new(dir.path());
        let loaded = prefs.interface_preferences(&app);
        assert_eq!(loaded.stability_policy, Stability::Testing);
        assert_eq!(loaded.feeds[0].source, uri("http://test/extra.xml"));
        assert_eq!(prefs.feed_preferences(&app), FeedPreferences::default());
    }

    #[test]
    fn test_directory_preferences_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let app = uri("http://test/app.xml");
        fs::create_dir_all(dir.path().join("feeds")).unwrap();
        fs::write(dir.path().join("feeds").join(format!("{}.json", app.escape())), "{not json").unwrap();

        let prefs = DirectoryPreferences::new(dir.path());
        assert_eq!(prefs.feed_preferences(&app), FeedPreferences::default());
    }
}
