//! Select command - solve requirements and print the selections.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::collections::HashSet;

use zinject_solver::model::{FeedUri, ImplementationSelection, Selections};
use zinject_solver::{ExternalSolver, FallbackSolver, Solver, SolverError};

use crate::handler::ConsoleHandler;
use crate::requirements::{RequirementsArgs, SolverContext, SourceArgs};

#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub requirements: RequirementsArgs,

    #[command(flatten)]
    pub source: SourceArgs,

    /// Ask the external solver to download fresh feeds
    #[arg(long)]
    pub refresh: bool,

    /// Only use the configured external solver
    #[arg(long)]
    pub external: bool,

    /// Print the selections as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: SelectArgs, verbose: u8) -> Result<i32> {
    let requirements = args.requirements.to_requirements()?;
    let context = SolverContext::load(&args.source)?;

    let external = || {
        ExternalSolver::new(&context.config)
            .with_verbosity(verbose)
            .with_refresh(args.refresh)
            .with_handler(ConsoleHandler::new().boxed())
    };

    let result = if args.external {
        external().solve(&requirements)
    } else if context.config.external_solver.is_empty() {
        context.backtracking().solve(&requirements)
    } else {
        FallbackSolver::new(Box::new(context.backtracking()), Box::new(external())).solve(&requirements)
    };

    let selections = match result {
        Ok(selections) => selections,
        Err(SolverError::Unsatisfiable(message)) => {
            eprintln!("{} {}", style("Error:").red().bold(), message);
            eprintln!(
                "Run {} to see why each candidate was rejected.",
                style(format!("zinject candidates {}", requirements.interface_uri)).cyan()
            );
            return Ok(1);
        }
        Err(e) => return Err(e).context(format!("Failed to select {}", requirements.interface_uri)),
    };

    if args.json {
        println!("{}", selections.to_json()?);
    } else {
        print_tree(&selections);
    }

    Ok(0)
}

fn print_tree(selections: &Selections) {
    let mut visited = HashSet::new();
    print_selection(selections, &selections.interface, 0, &mut visited);

    // selections not reachable from the main interface, e.g. runners of dropped commands
    for selection in &selections.implementations {
        if !visited.contains(&selection.interface) {
            print_selection(selections, &selection.interface, 0, &mut visited);
        }
    }
}

fn print_selection(selections: &Selections, interface: &FeedUri, depth: usize, visited: &mut HashSet<FeedUri>) {
    let indent = "  ".repeat(depth);
    let Some(selection) = selections.get(interface) else {
        println!("{}{} {}", indent, style(interface).cyan(), style("(not selected)").dim());
        return;
    };

    if !visited.insert(interface.clone()) {
        println!("{}{} {}", indent, style(interface).cyan(), style("(see above)").dim());
        return;
    }

    println!(
        "{}{} {} {}",
        indent,
        style(interface).cyan(),
        style(&selection.version).green(),
        style(format!("({})", describe(selection))).dim()
    );

    for child in children(selection) {
        print_selection(selections, &child, depth + 1, visited);
    }
}

fn describe(selection: &ImplementationSelection) -> String {
    match (&selection.distribution, &selection.package) {
        (Some(distribution), Some(package)) => format!("{} package {}", distribution, package),
        _ => selection.id.clone(),
    }
}

/// Interfaces an implementation's dependencies and command runners point at
fn children(selection: &ImplementationSelection) -> Vec<FeedUri> {
    let mut children: Vec<FeedUri> = selection.dependencies.iter().map(|d| d.interface().clone()).collect();
    for command in &selection.commands {
        if let Some(ref runner) = command.runner {
            children.push(runner.interface().clone());
        }
        children.extend(command.dependencies.iter().map(|d| d.interface().clone()));
    }

    let mut seen = HashSet::new();
    children.retain(|uri| seen.insert(uri.clone()));
    children
}
