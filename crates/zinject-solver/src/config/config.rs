use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{Result, SolverError};

/// How much network access solving may assume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkLevel {
    Offline,
    Minimal,
    Full,
}

impl Default for NetworkLevel {
    fn default() -> Self {
        NetworkLevel::Full
    }
}

impl NetworkLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "offline" => Some(NetworkLevel::Offline),
            "minimal" => Some(NetworkLevel::Minimal),
            "full" => Some(NetworkLevel::Full),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkLevel::Offline => "offline",
            NetworkLevel::Minimal => "minimal",
            NetworkLevel::Full => "full",
        }
    }
}

/// Effective solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub network_use: NetworkLevel,

    /// Prefer testing releases over stable ones
    #[serde(default)]
    pub help_with_testing: bool,

    /// Seconds before a cached feed counts as stale; 0 disables the check
    #[serde(default = "default_freshness")]
    pub freshness: u64,

    /// Directories holding cached feeds
    #[serde(default)]
    pub feed_dirs: Vec<PathBuf>,

    /// Directories holding unpacked implementations
    #[serde(default)]
    pub store_dirs: Vec<PathBuf>,

    /// Directories searched for native feeds and site packages
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,

    /// Program (and leading arguments) of an external solver
    #[serde(default)]
    pub external_solver: Vec<String>,

    /// Home directory with config.json and preferences
    #[serde(skip)]
    pub home: Option<PathBuf>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

fn default_freshness() -> u64 {
    30 * 24 * 60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network_use: NetworkLevel::default(),
            help_with_testing: false,
            freshness: default_freshness(),
            feed_dirs: Vec::new(),
            store_dirs: Vec::new(),
            data_dirs: Vec::new(),
            external_solver: Vec::new(),
            home: None,
            sources: HashMap::new(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from all sources (defaults, global, project, env)
    pub fn build<P: AsRef<Path>>(project_dir: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        for key in Self::config_keys() {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        // 1. Global config from <home>/config.json
        let global_config = loader.load_global_config()?;
        config.merge_raw_config(global_config, ConfigSource::Global)?;

        // 2. Project zinject.json
        if let Some(project_dir) = &project_dir {
            let project_config = loader.load_project_config(project_dir)?;
            config.merge_raw_config(project_config, ConfigSource::Project)?;
        }

        // 3. Environment variable overrides
        if use_environment {
            config.apply_env_overrides(&loader)?;
        }

        // 4. Fill in default directories
        config.resolve_paths(&loader);

        Ok(config)
    }

    /// Get the source of a configuration value
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Override a value programmatically (e.g. from command line flags)
    pub fn set_network_use(&mut self, level: NetworkLevel) {
        self.network_use = level;
        self.sources.insert("network-use".to_string(), ConfigSource::Command);
    }

    pub fn freshness_duration(&self) -> Duration {
        Duration::from_secs(self.freshness)
    }

    /// Directory for interface and feed preferences
    pub fn preferences_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    pub fn config_keys() -> &'static [&'static str] {
        &[
            "network-use",
            "help-with-testing",
            "freshness",
            "feed-dirs",
            "store-dirs",
            "data-dirs",
            "external-solver",
        ]
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        for (key, value) in raw.values {
            self.merge_config_value(&key, value, source.clone())?;
        }
        Ok(())
    }

    fn merge_config_value(&mut self, key: &str, value: serde_json::Value, source: ConfigSource) -> Result<()> {
        let invalid = |expected: &str| {
            SolverError::Config(format!("Invalid value for \"{}\" in {}: expected {}", key, source.as_str(), expected))
        };

        match key {
            "network-use" => {
                let level = value
                    .as_str()
                    .and_then(NetworkLevel::from_str)
                    .ok_or_else(|| invalid("offline, minimal or full"))?;
                self.network_use = level;
            }
            "help-with-testing" => {
                self.help_with_testing = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "freshness" => {
                self.freshness = value.as_u64().ok_or_else(|| invalid("a number of seconds"))?;
            }
            "feed-dirs" => self.feed_dirs = string_list(&value).ok_or_else(|| invalid("a list of paths"))?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            "store-dirs" => self.store_dirs = string_list(&value).ok_or_else(|| invalid("a list of paths"))?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            "data-dirs" => self.data_dirs = string_list(&value).ok_or_else(|| invalid("a list of paths"))?
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            "external-solver" => {
                self.external_solver = string_list(&value).ok_or_else(|| invalid("a list of strings"))?;
            }
            _ => {
                log::warn!("Ignoring unknown configuration key \"{}\" from {}", key, source.as_str());
                return Ok(());
            }
        }

        self.sources.insert(key.to_string(), source);
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        if let Some(level) = loader.get_env_config("network-use") {
            self.network_use = NetworkLevel::from_str(&level).ok_or_else(|| {
                SolverError::Config(format!("Invalid ZINJECT_NETWORK_USE \"{}\"", level))
            })?;
            self.sources.insert(
                "network-use".to_string(),
                ConfigSource::Environment("ZINJECT_NETWORK_USE".to_string()),
            );
        }

        if let Some(testing) = loader.get_env_bool("help-with-testing") {
            self.help_with_testing = testing;
            self.sources.insert(
                "help-with-testing".to_string(),
                ConfigSource::Environment("ZINJECT_HELP_WITH_TESTING".to_string()),
            );
        }

        if let Some(freshness) = loader.get_env_u64("freshness") {
            self.freshness = freshness;
            self.sources.insert(
                "freshness".to_string(),
                ConfigSource::Environment("ZINJECT_FRESHNESS".to_string()),
            );
        }

        if let Some(dirs) = loader.get_env_paths("feed-dirs") {
            self.feed_dirs = dirs;
            self.sources.insert(
                "feed-dirs".to_string(),
                ConfigSource::Environment("ZINJECT_FEED_DIRS".to_string()),
            );
        }

        if let Some(dirs) = loader.get_env_paths("store-dirs") {
            self.store_dirs = dirs;
            self.sources.insert(
                "store-dirs".to_string(),
                ConfigSource::Environment("ZINJECT_STORE_DIRS".to_string()),
            );
        }

        if let Some(solver) = loader.get_env_config("external-solver") {
            self.external_solver = solver.split_whitespace().map(String::from).collect();
            self.sources.insert(
                "external-solver".to_string(),
                ConfigSource::Environment("ZINJECT_EXTERNAL_SOLVER".to_string()),
            );
        }

        Ok(())
    }

    fn resolve_paths(&mut self, loader: &ConfigLoader) {
        self.home = Some(loader.get_home());

        let cache_dir = loader.get_cache_dir();
        if self.feed_dirs.is_empty() {
            self.feed_dirs.push(cache_dir.join("feeds"));
        }
        if self.store_dirs.is_empty() {
            self.store_dirs.push(cache_dir.join("implementations"));
        }
        if self.data_dirs.is_empty() {
            self.data_dirs.push(loader.get_data_dir());
        }
    }
}

fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    match value {
        serde_json::Value::String(s) => Some(vec![s.clone()]),
        serde_json::Value::Array(items) => items.iter().map(|v| v.as_str().map(String::from)).collect(),
        _ => None,
    }
}
