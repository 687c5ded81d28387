//! Answers the questions an external solver asks while selecting.

use console::style;
use dialoguer::Confirm;
use serde_json::Value;
use std::io::IsTerminal;

use zinject_solver::external::{BatchHandler, Handler};

/// Prompts on the terminal, or declines everything when not interactive.
pub struct ConsoleHandler {
    interactive: bool,
}

impl ConsoleHandler {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }

    pub fn boxed(self) -> Box<dyn Handler> {
        if self.interactive {
            Box::new(self)
        } else {
            Box::new(BatchHandler)
        }
    }
}

impl Handler for ConsoleHandler {
    fn confirm(&mut self, message: &str) -> bool {
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .unwrap_or(false)
    }

    fn confirm_keys(&mut self, feed: &str, keys: &Value) -> Vec<String> {
        let fingerprints: Vec<String> = match keys {
            Value::Object(map) => map.keys().cloned().collect(),
            Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            _ => Vec::new(),
        };

        fingerprints
            .into_iter()
            .filter(|fingerprint| {
                Confirm::new()
                    .with_prompt(format!("Trust key {} for {}?", fingerprint, feed))
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            })
            .collect()
    }

    fn report_error(&mut self, message: &str) {
        eprintln!("{} {}", style("Error:").red().bold(), message);
    }
}
