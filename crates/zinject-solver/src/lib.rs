//! Dependency solver for decentralized zinject feeds
//!
//! Given the requirements for running one program (an interface URI, an
//! optional command, a target architecture and version restrictions), the
//! solver picks one implementation per interface so that every essential
//! dependency, runner and executable binding is satisfied.

pub mod config;
pub mod error;
pub mod external;
pub mod feed_manager;
pub mod model;
pub mod package_manager;
pub mod solver;
pub mod store;

pub use config::{Config, NetworkLevel};
pub use error::{Result, SolverError};
pub use external::ExternalSolver;
pub use feed_manager::{DirectoryFeedManager, FeedManager, InMemoryFeedManager};
pub use model::{Architecture, FeedUri, Requirements, Selections};
pub use package_manager::{PackageManager, StaticPackageManager, UnsupportedPackageManager};
pub use solver::{BacktrackingSolver, CancellationToken, FallbackSolver, Solver};
pub use store::{DirectoryStore, InMemoryStore, Store};
