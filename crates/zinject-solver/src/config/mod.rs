//! Solver configuration
//!
//! Configuration is merged from several sources, highest priority first:
//!
//! 1. Environment variables (`ZINJECT_*`)
//! 2. Project `zinject.json`
//! 3. Global `config.json` in the zinject home directory (`ZINJECT_HOME`)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use zinject_solver::config::{Config, NetworkLevel};
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/path/to/project")), true).unwrap();
//! if config.network_use == NetworkLevel::Offline {
//!     println!("Only cached implementations will be considered");
//! }
//! ```

mod config;
mod source;

pub use config::{Config, NetworkLevel};
pub use source::{ConfigLoader, ConfigSource, RawConfig};
