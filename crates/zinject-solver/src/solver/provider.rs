//! Gathers and ranks the candidates for an interface.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use zinject_version::ImplementationVersion;

use super::candidate::SelectionCandidate;
use super::policy::CandidatePolicy;
use crate::config::{Config, NetworkLevel};
use crate::error::{Result, SolverError};
use crate::feed_manager::FeedManager;
use crate::model::{
    Feed, FeedPreferences, FeedUri, Implementation, ImplementationSelection, InterfacePreferences,
    ManifestDigest, PreferencesProvider, Requirements,
};
use crate::package_manager::PackageManager;
use crate::store::Store;

/// Read-through caches over the feed, preference, store and package
/// collaborators for one solver invocation.
///
/// Everything is loaded at most once and never refreshed, so every pass of
/// the invocation sees the same feeds and preferences.
pub struct CandidateProvider<'a> {
    config: &'a Config,
    feed_manager: &'a dyn FeedManager,
    store: &'a dyn Store,
    package_manager: &'a dyn PackageManager,
    preferences: &'a dyn PreferencesProvider,

    feeds: HashMap<FeedUri, Option<Arc<Feed>>>,
    interface_preferences: HashMap<FeedUri, InterfacePreferences>,
    feed_preferences: HashMap<FeedUri, FeedPreferences>,
    policies: HashMap<FeedUri, CandidatePolicy>,
    native_implementations: HashMap<FeedUri, Vec<Implementation>>,
    store_contains: HashMap<ManifestDigest, bool>,
    own_version: Option<ImplementationVersion>,
}

impl<'a> CandidateProvider<'a> {
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
            feeds: HashMap::new(),
            interface_preferences: HashMap::new(),
            feed_preferences: HashMap::new(),
            policies: HashMap::new(),
            native_implementations: HashMap::new(),
            store_contains: HashMap::new(),
            own_version: ImplementationVersion::parse(env!("CARGO_PKG_VERSION")).ok(),
        }
    }

    /// All candidates for `requirements`, best first. Unsuitable ones are
    /// included and carry notes explaining why.
    pub fn get_sorted_candidates(&mut self, requirements: &Requirements) -> Result<Vec<SelectionCandidate>> {
        let feeds = self.get_feeds(requirements)?;
        let mut candidates = Vec::new();

        for (feed_uri, feed) in &feeds {
            let feed_preferences = self.feed_preferences(feed_uri);

            for implementation in &feed.implementations {
                candidates.push(self.make_candidate(feed_uri.clone(), &feed_preferences, implementation.clone(), requirements));
            }

            if !feed.package_implementations.is_empty() {
                let distribution_feed = feed_uri.as_distribution();
                let distribution_preferences = self.feed_preferences(&distribution_feed);
                let allowed = self
                    .native_implementations(feed_uri, feed)
                    .into_iter()
                    .filter(|i| distribution_allowed(i, &requirements.distributions));
                for implementation in allowed {
                    candidates.push(self.make_candidate(
                        distribution_feed.clone(),
                        &distribution_preferences,
                        implementation,
                        requirements,
                    ));
                }
            }
        }

        let policy = self.policy_for(requirements);
        policy.sort(&mut candidates);

        log::debug!(
            "{} candidates for {} from {} feeds",
            candidates.len(),
            requirements.interface_uri,
            feeds.len()
        );
        Ok(candidates)
    }

    /// The feed element a selection was made from, for adding commands to it later
    pub fn lookup_original_implementation(&mut self, selection: &ImplementationSelection) -> Result<Option<Implementation>> {
        let feed_uri = selection.feed();

        if feed_uri.is_distribution() {
            return Ok(self
                .native_implementations
                .get(feed_uri)
                .and_then(|found| found.iter().find(|i| i.id == selection.id))
                .cloned());
        }

        Ok(self
            .load_feed(feed_uri)?
            .and_then(|feed| feed.implementation(&selection.id).cloned()))
    }

    pub fn is_stale(&self) -> bool {
        self.feed_manager.is_stale()
    }

    fn make_candidate(
        &mut self,
        feed_uri: FeedUri,
        feed_preferences: &FeedPreferences,
        implementation: Implementation,
        requirements: &Requirements,
    ) -> SelectionCandidate {
        let is_cached = self.is_cached(&implementation);
        let offline_uncached = self.config.network_use == NetworkLevel::Offline && !is_cached;
        SelectionCandidate::new(feed_uri, feed_preferences, implementation, requirements, is_cached, offline_uncached)
    }

    /// The feeds reachable from the interface, keyed by URI in discovery order
    fn get_feeds(&mut self, requirements: &Requirements) -> Result<IndexMap<FeedUri, Arc<Feed>>> {
        let interface = &requirements.interface_uri;
        let mut feeds = IndexMap::new();

        self.add_feed(&mut feeds, interface, requirements)?;

        for reference in self.interface_preferences(interface).feeds {
            self.add_feed(&mut feeds, &reference.source, requirements).map_err(|e| {
                SolverError::feed(
                    &reference.source,
                    format!("feed manually registered for interface {} is unavailable ({})", interface, e),
                )
            })?;
        }

        for path in self.local_feed_paths(interface) {
            let Some(uri) = path.to_str().and_then(|p| FeedUri::parse(p).ok()) else {
                continue;
            };
            self.add_feed(&mut feeds, &uri, requirements)?;
        }

        Ok(feeds)
    }

    /// Adds a feed and every compatible feed it references
    fn add_feed(&mut self, feeds: &mut IndexMap<FeedUri, Arc<Feed>>, uri: &FeedUri, requirements: &Requirements) -> Result<()> {
        if feeds.contains_key(uri) {
            return Ok(());
        }

        let Some(feed) = self.load_feed(uri)? else {
            return Ok(());
        };
        feeds.insert(uri.clone(), Arc::clone(&feed));

        for reference in &feed.feeds {
            if reference.architecture.is_compatible(&requirements.architecture)
                && languages_intersect(&reference.languages, &requirements.languages)
            {
                self.add_feed(feeds, &reference.source, requirements)?;
            }
        }

        Ok(())
    }

    /// `None` for feeds this solver is too old to understand
    fn load_feed(&mut self, uri: &FeedUri) -> Result<Option<Arc<Feed>>> {
        if let Some(cached) = self.feeds.get(uri) {
            return Ok(cached.clone());
        }

        let feed = self.feed_manager.get_feed(uri)?;
        let usable = match (&feed.min_injector_version, &self.own_version) {
            (Some(required), Some(own)) if required > own => {
                log::warn!("Feed {} requires solver version {} or newer, skipping it", uri, required);
                None
            }
            _ => Some(feed),
        };

        self.feeds.insert(uri.clone(), usable.clone());
        Ok(usable)
    }

    /// Native feeds and site packages installed for the interface
    fn local_feed_paths(&self, interface: &FeedUri) -> Vec<PathBuf> {
        let escaped = interface.escape();
        let mut paths = Vec::new();

        for data_dir in &self.config.data_dirs {
            let native = data_dir.join("native_feeds").join(format!("{}.json", escaped));
            if native.is_file() {
                paths.push(native);
            }

            let site_packages = data_dir.join("site-packages").join(&escaped);
            if let Ok(entries) = fs::read_dir(&site_packages) {
                let mut found: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path().join("0install").join("feed.json"))
                    .filter(|p| p.is_file())
                    .collect();
                found.sort();
                paths.extend(found);
            }
        }

        paths
    }

    /// Everything the package manager offers for the feed, whatever the distribution
    fn native_implementations(&mut self, feed_uri: &FeedUri, feed: &Feed) -> Vec<Implementation> {
        let distribution_feed = feed_uri.as_distribution();
        if let Some(found) = self.native_implementations.get(&distribution_feed) {
            return found.clone();
        }

        let found: Vec<Implementation> = feed
            .package_implementations
            .iter()
            .flat_map(|package| self.package_manager.query(package, &[]))
            .collect();

        self.native_implementations.insert(distribution_feed, found.clone());
        found
    }

    fn is_cached(&mut self, implementation: &Implementation) -> bool {
        if implementation.local_path.is_some() {
            return true;
        }
        if let Some(ref native) = implementation.native {
            return native.installed;
        }
        if implementation.manifest_digest.is_empty() {
            return false;
        }

        let store = self.store;
        *self
            .store_contains
            .entry(implementation.manifest_digest.clone())
            .or_insert_with_key(|digest| store.contains(digest))
    }

    fn interface_preferences(&mut self, interface: &FeedUri) -> InterfacePreferences {
        let preferences = self.preferences;
        self.interface_preferences
            .entry(interface.clone())
            .or_insert_with_key(|uri| preferences.interface_preferences(uri))
            .clone()
    }

    fn feed_preferences(&mut self, feed: &FeedUri) -> FeedPreferences {
        let preferences = self.preferences;
        self.feed_preferences
            .entry(feed.clone())
            .or_insert_with_key(|uri| preferences.feed_preferences(uri))
            .clone()
    }

    fn policy_for(&mut self, requirements: &Requirements) -> CandidatePolicy {
        if let Some(policy) = self.policies.get(&requirements.interface_uri) {
            return policy.clone();
        }

        let interface_policy = self.interface_preferences(&requirements.interface_uri).stability_policy;
        let policy = CandidatePolicy::new()
            .network_use(self.config.network_use)
            .stability_policy(CandidatePolicy::for_interface(interface_policy, self.config.help_with_testing))
            .languages(requirements.languages.clone());

        self.policies.insert(requirements.interface_uri.clone(), policy.clone());
        policy
    }
}

fn distribution_allowed(implementation: &Implementation, distributions: &[String]) -> bool {
    distributions.is_empty()
        || implementation
            .distribution()
            .map_or(false, |name| distributions.iter().any(|d| d == name))
}

fn languages_intersect(declared: &BTreeSet<String>, requested: &BTreeSet<String>) -> bool {
    declared.is_empty() || requested.is_empty() || declared.iter().any(|l| requested.contains(l))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_manager::InMemoryFeedManager;
    use crate::model::{
        Architecture, Command, Cpu, FeedReference, InMemoryPreferences, NativePackage, Os, PackageImplementation,
    };
    use crate::package_manager::{StaticPackageManager, UnsupportedPackageManager};
    use crate::store::InMemoryStore;
    use zinject_version::Stability;

    fn uri(s: &str) -> FeedUri {
        FeedUri::parse(s).unwrap()
    }

    fn implementation(id: &str, version: &str) -> Implementation {
        let mut implementation = Implementation::new(id, ImplementationVersion::parse(version).unwrap());
        implementation.commands.push(Command::new("run"));
        implementation
    }

    fn requirements() -> Requirements {
        Requirements::new(uri("http://test/app.xml"))
            .with_command("run")
            .with_architecture(Architecture::new(Os::Linux, Cpu::X64))
    }

    fn ids(candidates: &[SelectionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_follows_compatible_feed_references() {
        let mut main = Feed::new("App");
        main.implementations.push(implementation("app1", "1.0"));
        main.feeds.push(FeedReference::new(uri("http://test/app-linux.xml")));
        let mut windows = FeedReference::new(uri("http://test/app-windows.xml"));
        windows.architecture = Architecture::new(Os::Windows, Cpu::All);
        main.feeds.push(windows);
        // Cycle back to the main feed
        let mut linux = Feed::new("App Linux");
        linux.implementations.push(implementation("app2", "2.0"));
        linux.feeds.push(FeedReference::new(uri("http://test/app.xml")));

        let mut feeds = InMemoryFeedManager::new();
        feeds.add(uri("http://test/app.xml"), main);
        feeds.add(uri("http://test/app-linux.xml"), linux);

        let config = Config::default();
        let store = InMemoryStore::new();
        let prefs = InMemoryPreferences::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &UnsupportedPackageManager, &prefs);

        let candidates = provider.get_sorted_candidates(&requirements()).unwrap();
        assert_eq!(ids(&candidates), vec!["app2", "app1"]);
        assert_eq!(candidates[0].feed_uri, uri("http://test/app-linux.xml"));
    }

    #[test]
    fn test_interface_preference_feed_errors_have_context() {
        let mut feeds = InMemoryFeedManager::new();
        feeds.add(uri("http://test/app.xml"), Feed::new("App"));

        let mut prefs = InMemoryPreferences::new();
        prefs.set_interface(
            uri("http://test/app.xml"),
            InterfacePreferences {
                stability_policy: Stability::Unset,
                feeds: vec![FeedReference::new(uri("http://test/missing.xml"))],
            },
        );

        let config = Config::default();
        let store = InMemoryStore::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &UnsupportedPackageManager, &prefs);

        let err = provider.get_sorted_candidates(&requirements()).unwrap_err();
        assert!(err
            .to_string()
            .contains("manually registered for interface http://test/app.xml"));
    }

    #[test]
    fn test_skips_feeds_for_newer_solver() {
        let mut main = Feed::new("App");
        main.min_injector_version = Some(ImplementationVersion::parse("999.0").unwrap());
        main.implementations.push(implementation("app1", "1.0"));

        let mut feeds = InMemoryFeedManager::new();
        feeds.add(uri("http://test/app.xml"), main);

        let config = Config::default();
        let store = InMemoryStore::new();
        let prefs = InMemoryPreferences::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &UnsupportedPackageManager, &prefs);

        assert!(provider.get_sorted_candidates(&requirements()).unwrap().is_empty());
    }

    #[test]
    fn test_offline_marks_uncached() {
        let mut cached = implementation("cached", "1.0");
        cached.manifest_digest.sha256 = Some("abc".to_string());
        let mut remote = implementation("remote", "2.0");
        remote.manifest_digest.sha256 = Some("def".to_string());
        let mut local = implementation("local", "0.5");
        local.local_path = Some("/opt/app".to_string());

        let mut main = Feed::new("App");
        main.implementations.extend([cached.clone(), remote, local]);
        let mut feeds = InMemoryFeedManager::new();
        feeds.add(uri("http://test/app.xml"), main);

        let mut store = InMemoryStore::new();
        store.add(&cached.manifest_digest);
        let mut config = Config::default();
        config.network_use = NetworkLevel::Offline;
        let prefs = InMemoryPreferences::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &UnsupportedPackageManager, &prefs);

        let candidates = provider.get_sorted_candidates(&requirements()).unwrap();
        // Offline ranks cached implementations first
        assert_eq!(ids(&candidates), vec!["cached", "local", "remote"]);
        assert!(candidates[0].is_suitable());
        assert!(candidates[1].is_suitable());
        assert_eq!(candidates[2].notes(), Some("Not cached and network use is offline"));
    }

    #[test]
    fn test_native_packages_use_distribution_feed() {
        let mut main = Feed::new("Python");
        main.implementations.push(implementation("py1", "3.9"));
        main.package_implementations.push(PackageImplementation {
            package: "python3".to_string(),
            distributions: Vec::new(),
            commands: vec![Command::new("run")],
            dependencies: Vec::new(),
            bindings: Vec::new(),
        });

        let mut native = Implementation::new("package:deb:python3:3.11", ImplementationVersion::parse("3.11").unwrap());
        native.native = Some(NativePackage {
            distribution: "Debian".to_string(),
            package: "python3".to_string(),
            installed: true,
            quick_test_file: Some("/usr/bin/python3".to_string()),
        });
        let mut packages = StaticPackageManager::new();
        packages.add("python3", native);

        let mut feeds = InMemoryFeedManager::new();
        feeds.add(uri("http://test/python.xml"), main);

        let config = Config::default();
        let store = InMemoryStore::new();
        let prefs = InMemoryPreferences::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &packages, &prefs);

        let requirements = Requirements::new(uri("http://test/python.xml"))
            .with_command("run")
            .with_architecture(Architecture::new(Os::Linux, Cpu::X64));
        let candidates = provider.get_sorted_candidates(&requirements).unwrap();
        assert_eq!(ids(&candidates), vec!["package:deb:python3:3.11", "py1"]);
        assert_eq!(candidates[0].feed_uri, uri("distribution:http://test/python.xml"));
        assert!(candidates[0].is_cached);

        let selection = candidates[0].to_selection(&requirements);
        assert_eq!(selection.distribution.as_deref(), Some("Debian"));
        let original = provider.lookup_original_implementation(&selection).unwrap().unwrap();
        assert_eq!(original.id, "package:deb:python3:3.11");
    }

    #[test]
    fn test_site_packages_are_added() {
        let data = tempfile::TempDir::new().unwrap();
        let app = uri("http://test/app.xml");
        let package_dir = data.path().join("site-packages").join(app.escape()).join("1.0-local").join("0install");
        fs::create_dir_all(&package_dir).unwrap();
        let feed_path = package_dir.join("feed.json");
        fs::write(
            &feed_path,
            r#"{"name": "App", "implementations": [{"id": "site1", "version": "1.0", "local-path": "..",
                "commands": [{"name": "run"}]}]}"#,
        )
        .unwrap();

        let mut feeds = InMemoryFeedManager::new();
        feeds.add(app.clone(), Feed::new("App"));
        let site_uri = uri(feed_path.to_str().unwrap());
        feeds.add(site_uri.clone(), Feed::from_json(&fs::read_to_string(&feed_path).unwrap()).unwrap());

        let mut config = Config::default();
        config.data_dirs = vec![data.path().to_path_buf()];
        let store = InMemoryStore::new();
        let prefs = InMemoryPreferences::new();
        let mut provider = CandidateProvider::new(&config, &feeds, &store, &UnsupportedPackageManager, &prefs);

        let candidates = provider.get_sorted_candidates(&requirements()).unwrap();
        assert_eq!(ids(&candidates), vec!["site1"]);
        assert_eq!(candidates[0].feed_uri, site_uri);
    }
}
