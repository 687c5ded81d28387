use directories::ProjectDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SolverError};

/// Where the effective value of a configuration key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    /// `config.json` in the zinject home
    Global,
    /// `zinject.json` in the working directory
    Project,
    /// Named `ZINJECT_*` variable
    Environment(String),
    /// Set through a `Config` setter, e.g. `--offline`
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
        }
    }
}

/// Untyped keys of one config file, in file order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(flatten)]
    pub values: IndexMap<String, serde_json::Value>,
}

/// Locates and reads the JSON files and `ZINJECT_*` variables that make
/// up a [`Config`](super::Config).
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// A non-empty environment variable, unless the environment is ignored
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }
        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// `override_var` if set, else the platform directory picked by `pick`,
    /// else `fallback` under the zinject home
    fn resolve_dir(&self, override_var: &str, pick: fn(&ProjectDirs) -> &Path, fallback: &str) -> PathBuf {
        if let Some(dir) = self.get_env(override_var) {
            return PathBuf::from(dir);
        }
        match ProjectDirs::from("", "", "zinject") {
            Some(dirs) => pick(&dirs).to_path_buf(),
            None => self.get_home().join(fallback),
        }
    }

    /// Holds config.json and the preferences
    pub fn get_home(&self) -> PathBuf {
        if let Some(home) = self.get_env("ZINJECT_HOME") {
            return PathBuf::from(home);
        }
        if let Some(dirs) = ProjectDirs::from("", "", "zinject") {
            return dirs.config_dir().to_path_buf();
        }
        directories::BaseDirs::new()
            .map(|base| base.home_dir().join(".zinject"))
            .unwrap_or_else(|| PathBuf::from(".zinject"))
    }

    /// Holds cached feeds and unpacked implementations
    pub fn get_cache_dir(&self) -> PathBuf {
        self.resolve_dir("ZINJECT_CACHE_DIR", ProjectDirs::cache_dir, "cache")
    }

    /// Holds native feeds and site packages
    pub fn get_data_dir(&self) -> PathBuf {
        self.resolve_dir("ZINJECT_DATA_DIR", ProjectDirs::data_dir, "data")
    }

    /// Reads a JSON config file; a missing file is an empty config
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| SolverError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| SolverError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn load_global_config(&self) -> Result<RawConfig> {
        self.load_config_file(self.get_home().join("config.json"))
    }

    pub fn load_project_config<P: AsRef<Path>>(&self, project_dir: P) -> Result<RawConfig> {
        self.load_config_file(project_dir.as_ref().join("zinject.json"))
    }

    /// The override for `key`: "foo-bar" is read from `ZINJECT_FOO_BAR`
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_env(&format!("ZINJECT_{}", key.replace('-', "_").to_uppercase()))
    }

    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key)
            .map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0"))
    }

    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    /// Split like PATH
    pub fn get_env_paths(&self, key: &str) -> Option<Vec<PathBuf>> {
        self.get_env_config(key).map(|val| env::split_paths(&val).collect())
    }
}
