//! Config command - print the effective configuration.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde_json::{json, Value};
use std::path::PathBuf;

use zinject_solver::config::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Only print this key
    pub key: Option<String>,

    /// Print the configuration as JSON
    #[arg(long)]
    pub json: bool,

    /// Working directory holding zinject.json
    #[arg(short = 'd', long, default_value = ".")]
    pub working_dir: PathBuf,
}

fn paths(dirs: &[PathBuf]) -> Value {
    dirs.iter().map(|p| Value::String(p.display().to_string())).collect()
}

fn value_of(config: &Config, key: &str) -> Option<Value> {
    let value = match key {
        "network-use" => json!(config.network_use.as_str()),
        "help-with-testing" => json!(config.help_with_testing),
        "freshness" => json!(config.freshness),
        "feed-dirs" => paths(&config.feed_dirs),
        "store-dirs" => paths(&config.store_dirs),
        "data-dirs" => paths(&config.data_dirs),
        "external-solver" => json!(config.external_solver),
        _ => return None,
    };
    Some(value)
}

pub fn execute(args: ConfigArgs) -> Result<i32> {
    let working_dir = args
        .working_dir
        .canonicalize()
        .context("Failed to resolve working directory")?;
    let config = Config::build(Some(&working_dir), true)?;

    let keys: Vec<&str> = match args.key.as_deref() {
        Some(key) if value_of(&config, key).is_none() => {
            eprintln!("{} Unknown configuration key \"{}\"", style("Error:").red().bold(), key);
            return Ok(1);
        }
        Some(key) => vec![key],
        None => Config::config_keys().to_vec(),
    };

    if args.json {
        let map: serde_json::Map<String, Value> = keys
            .iter()
            .filter_map(|key| value_of(&config, key).map(|v| (key.to_string(), v)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(0);
    }

    for key in keys {
        let Some(value) = value_of(&config, key) else {
            continue;
        };
        let source = config.get_source(key).map(|s| s.as_str()).unwrap_or("default");
        println!("{} = {} {}", style(key).cyan(), value, style(format!("({})", source)).dim());
    }

    Ok(0)
}
