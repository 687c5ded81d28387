//! Arguments shared by the commands that solve.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use zinject_solver::config::{Config, NetworkLevel};
use zinject_solver::model::{Architecture, Cpu, DirectoryPreferences, FeedUri, Os, Requirements};
use zinject_solver::{BacktrackingSolver, DirectoryFeedManager, DirectoryStore, StaticPackageManager};
use zinject_version::VersionRange;

#[derive(Args, Debug)]
pub struct RequirementsArgs {
    /// Interface URI or absolute path of a local feed
    pub interface: String,

    /// Command to select (default: run, or compile with --source)
    #[arg(long)]
    pub command: Option<String>,

    /// Target operating system (e.g. Linux, Windows, MacOSX)
    #[arg(long)]
    pub os: Option<String>,

    /// Target CPU (e.g. x86_64, i686)
    #[arg(long)]
    pub cpu: Option<String>,

    /// Select source code instead of a binary
    #[arg(long, conflicts_with = "cpu")]
    pub source: bool,

    /// Acceptable versions of the interface (e.g. "1.2..!2")
    #[arg(long)]
    pub version: Option<String>,

    /// Acceptable versions of another interface
    #[arg(long, num_args = 2, value_names = ["URI", "RANGE"], action = clap::ArgAction::Append)]
    pub version_for: Vec<String>,

    /// Preferred language (can be used multiple times)
    #[arg(long, action = clap::ArgAction::Append)]
    pub language: Vec<String>,
}

impl RequirementsArgs {
    pub fn to_requirements(&self) -> Result<Requirements> {
        let interface = parse_interface(&self.interface)?;
        let mut requirements = Requirements::new(interface.clone());
        requirements.command = self.command.clone();

        let os = self.os.as_deref().map(Os::from_token).unwrap_or(Os::All);
        let cpu = if self.source {
            Cpu::Source
        } else {
            self.cpu.as_deref().map(Cpu::from_token).unwrap_or(Cpu::All)
        };
        if os == Os::Unknown || cpu == Cpu::Unknown {
            bail!("Unknown architecture {}-{}", self.os.as_deref().unwrap_or("*"), self.cpu.as_deref().unwrap_or("*"));
        }
        requirements.architecture = Architecture::new(os, cpu);

        for language in &self.language {
            requirements.languages.insert(language.clone());
        }

        if let Some(ref version) = self.version {
            requirements.add_restriction(interface, parse_range(version)?);
        }
        for pair in self.version_for.chunks(2) {
            let [uri, range] = pair else {
                bail!("--version-for needs an interface and a range");
            };
            requirements.add_restriction(parse_interface(uri)?, parse_range(range)?);
        }

        Ok(requirements)
    }
}

fn parse_interface(text: &str) -> Result<FeedUri> {
    let path = PathBuf::from(text);
    if path.is_relative() && path.exists() {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", text))?;
        return Ok(FeedUri::parse(&absolute.to_string_lossy())?);
    }
    Ok(FeedUri::parse(text)?)
}

fn parse_range(text: &str) -> Result<VersionRange> {
    VersionRange::parse(text).with_context(|| format!("Invalid version range \"{}\"", text))
}

/// Where feeds and implementations come from
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Only use implementations that are already cached
    #[arg(long)]
    pub offline: bool,

    /// Directory of cached feeds (can be used multiple times)
    #[arg(long, action = clap::ArgAction::Append)]
    pub feeds_dir: Vec<PathBuf>,

    /// Implementation store directory (can be used multiple times)
    #[arg(long, action = clap::ArgAction::Append)]
    pub store_dir: Vec<PathBuf>,

    /// Working directory holding zinject.json
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

/// Configuration and the on-disk collaborators a solver reads from.
pub struct SolverContext {
    pub config: Config,
    feeds: DirectoryFeedManager,
    store: DirectoryStore,
    packages: StaticPackageManager,
    preferences: DirectoryPreferences,
}

impl SolverContext {
    pub fn load(args: &SourceArgs) -> Result<Self> {
        let working_dir = args
            .working_dir
            .canonicalize()
            .context("Failed to resolve working directory")?;

        let mut config = Config::build(Some(&working_dir), true)?;
        if args.offline {
            config.set_network_use(NetworkLevel::Offline);
        }
        if !args.feeds_dir.is_empty() {
            config.feed_dirs = args.feeds_dir.clone();
        }
        if !args.store_dir.is_empty() {
            config.store_dirs = args.store_dir.clone();
        }

        let feeds = DirectoryFeedManager::new(config.feed_dirs.clone()).with_freshness(config.freshness_duration());
        let store = DirectoryStore::new(config.store_dirs.clone());
        let preferences = DirectoryPreferences::new(config.preferences_dir().unwrap_or_else(|| working_dir.clone()));

        Ok(Self {
            config,
            feeds,
            store,
            packages: StaticPackageManager::new(),
            preferences,
        })
    }

    pub fn backtracking(&self) -> BacktrackingSolver<'_> {
        BacktrackingSolver::new(&self.config, &self.feeds, &self.store, &self.packages, &self.preferences)
    }
}
