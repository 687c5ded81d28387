/// End-to-end solving against feeds, preferences and an implementation
/// store laid out on disk.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use zinject_solver::config::{Config, NetworkLevel};
use zinject_solver::model::{Architecture, Cpu, DirectoryPreferences, FeedUri, Os, Requirements};
use zinject_solver::{BacktrackingSolver, DirectoryFeedManager, DirectoryStore, Solver, SolverError, StaticPackageManager};

struct Layout {
    root: TempDir,
}

impl Layout {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        for dir in ["feeds", "store", "prefs/interfaces", "prefs/feeds"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        Self { root }
    }

    fn path(&self, sub: &str) -> std::path::PathBuf {
        self.root.path().join(sub)
    }

    fn write_feed(&self, uri: &FeedUri, json: &str) {
        write(&self.path("feeds").join(format!("{}.json", uri.escape())), json);
    }

    fn write_interface_preferences(&self, uri: &FeedUri, json: &str) {
        write(&self.path("prefs/interfaces").join(format!("{}.json", uri.escape())), json);
    }

    fn write_feed_preferences(&self, uri: &FeedUri, json: &str) {
        write(&self.path("prefs/feeds").join(format!("{}.json", uri.escape())), json);
    }

    fn add_to_store(&self, id: &str) {
        fs::create_dir_all(self.path("store").join(id)).unwrap();
    }

    fn solve(&self, config: &Config, requirements: &Requirements) -> zinject_solver::Result<zinject_solver::Selections> {
        let feeds = DirectoryFeedManager::new(vec![self.path("feeds")]);
        let store = DirectoryStore::new(vec![self.path("store")]);
        let packages = StaticPackageManager::new();
        let preferences = DirectoryPreferences::new(self.path("prefs"));

        BacktrackingSolver::new(config, &feeds, &store, &packages, &preferences)
            .with_host_architecture(Architecture::new(Os::Linux, Cpu::X64))
            .solve(requirements)
    }
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

fn uri(name: &str) -> FeedUri {
    FeedUri::parse(&format!("http://test/{}.xml", name)).unwrap()
}

const APP_FEED: &str = r#"{
    "name": "App",
    "implementations": [
        {
            "id": "app1",
            "version": "1.0",
            "stability": "stable",
            "manifest-digest": {"sha256new": "one"},
            "commands": [{"name": "run", "path": "app"}],
            "dependencies": [{"interface": "http://test/lib.xml", "version": "2.."}]
        },
        {
            "id": "app2",
            "version": "2.0",
            "stability": "testing",
            "manifest-digest": {"sha256new": "two"},
            "commands": [{"name": "run", "path": "app"}],
            "dependencies": [{"interface": "http://test/lib.xml", "version": "2.."}]
        }
    ]
}"#;

const LIB_FEED: &str = r#"{
    "name": "Lib",
    "implementations": [
        {"id": "lib1", "version": "1.5", "manifest-digest": {"sha256new": "lib-one"}},
        {"id": "lib2", "version": "2.1", "manifest-digest": {"sha256new": "lib-two"}}
    ]
}"#;

fn layout() -> Layout {
    let layout = Layout::new();
    layout.write_feed(&uri("app"), APP_FEED);
    layout.write_feed(&uri("lib"), LIB_FEED);
    layout
}

fn ids(selections: &zinject_solver::Selections) -> Vec<&str> {
    selections.implementations.iter().map(|s| s.id.as_str()).collect()
}

#[test]
fn test_solve_from_feed_directory() {
    let layout = layout();
    let config = Config::default();
    let requirements = Requirements::new(uri("app")).with_command("run");

    let selections = layout.solve(&config, &requirements).unwrap();

    assert_eq!(selections.interface, uri("app"));
    assert_eq!(selections.command.as_deref(), Some("run"));
    assert_eq!(ids(&selections), vec!["app1", "lib2"]);
}

#[test]
fn test_interface_stability_preference() {
    let layout = layout();
    layout.write_interface_preferences(&uri("app"), r#"{"stability-policy": "testing"}"#);

    let selections = layout
        .solve(&Config::default(), &Requirements::new(uri("app")))
        .unwrap();
    assert_eq!(ids(&selections), vec!["app2", "lib2"]);
}

#[test]
fn test_help_with_testing() {
    let layout = layout();
    let mut config = Config::default();
    config.help_with_testing = true;

    let selections = layout.solve(&config, &Requirements::new(uri("app"))).unwrap();
    assert_eq!(ids(&selections), vec!["app2", "lib2"]);
}

#[test]
fn test_user_marks_implementation_buggy() {
    let layout = layout();
    layout.write_interface_preferences(&uri("app"), r#"{"stability-policy": "testing"}"#);
    layout.write_feed_preferences(&uri("app"), r#"{"implementations": {"app2": {"user-stability": "buggy"}}}"#);

    let selections = layout
        .solve(&Config::default(), &Requirements::new(uri("app")))
        .unwrap();
    assert_eq!(ids(&selections), vec!["app1", "lib2"]);
}

#[test]
fn test_offline_uses_cached_implementations() {
    let layout = layout();
    layout.add_to_store("sha256new_one");
    layout.add_to_store("sha256new_lib-two");

    let mut config = Config::default();
    config.set_network_use(NetworkLevel::Offline);
    config.help_with_testing = true;

    let selections = layout.solve(&config, &Requirements::new(uri("app"))).unwrap();
    assert_eq!(ids(&selections), vec!["app1", "lib2"]);
}

#[test]
fn test_offline_without_cache_fails() {
    let layout = layout();
    let mut config = Config::default();
    config.set_network_use(NetworkLevel::Offline);

    let err = layout.solve(&config, &Requirements::new(uri("app"))).unwrap_err();
    assert!(matches!(err, SolverError::Unsatisfiable(_)));
}

#[test]
fn test_missing_dependency_feed() {
    let layout = Layout::new();
    layout.write_feed(&uri("app"), APP_FEED);

    let err = layout
        .solve(&Config::default(), &Requirements::new(uri("app")))
        .unwrap_err();
    assert!(matches!(err, SolverError::Feed { .. }));
    assert!(err.to_string().contains("http://test/lib.xml"));
}

#[test]
fn test_selections_json_output() {
    let layout = layout();
    let selections = layout
        .solve(&Config::default(), &Requirements::new(uri("app")).with_command("run"))
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&selections.to_json().unwrap()).unwrap();
    assert_eq!(json["interface"], "http://test/app.xml");
    assert_eq!(json["command"], "run");
    assert_eq!(json["implementations"][0]["id"], "app1");
    assert_eq!(json["implementations"][1]["interface"], "http://test/lib.xml");
}
