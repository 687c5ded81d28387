//! Candidates command - show how the implementations of an interface rank.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use zinject_solver::solver::SelectionCandidate;

use crate::requirements::{RequirementsArgs, SolverContext, SourceArgs};

#[derive(Args, Debug)]
pub struct CandidatesArgs {
    #[command(flatten)]
    pub requirements: RequirementsArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the candidates as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct CandidateRow<'a> {
    feed: &'a str,
    id: &'a str,
    version: String,
    architecture: String,
    stability: String,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl<'a> From<&'a SelectionCandidate> for CandidateRow<'a> {
    fn from(candidate: &'a SelectionCandidate) -> Self {
        Self {
            feed: candidate.feed_uri.as_str(),
            id: candidate.id(),
            version: candidate.implementation.version.to_string(),
            architecture: candidate.implementation.architecture.to_string(),
            stability: candidate.effective_stability().to_string(),
            cached: candidate.is_cached,
            notes: candidate.notes(),
        }
    }
}

pub fn execute(args: CandidatesArgs) -> Result<i32> {
    let requirements = args.requirements.to_requirements()?;
    let context = SolverContext::load(&args.source)?;

    let candidates = context
        .backtracking()
        .candidates(&requirements)
        .with_context(|| format!("Failed to load candidates for {}", requirements.interface_uri))?;

    let rows: Vec<CandidateRow> = candidates.iter().map(CandidateRow::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(0);
    }

    if rows.is_empty() {
        println!("{} No implementations of {}", style("Info:").cyan(), requirements.interface_uri);
        return Ok(0);
    }

    for (position, row) in rows.iter().enumerate() {
        let marker = if row.notes.is_none() {
            style("+").green().bold()
        } else {
            style("-").red()
        };
        println!(
            "{} {:>3}. {} {} [{}, {}{}] {}",
            marker,
            position + 1,
            style(row.version.as_str()).green(),
            style(row.id).bold(),
            row.stability,
            row.architecture,
            if row.cached { ", cached" } else { "" },
            style(row.feed).dim()
        );
        if let Some(notes) = row.notes {
            println!("        {}", style(notes).yellow());
        }
    }

    Ok(0)
}
