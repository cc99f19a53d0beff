//! # reflex_app — Scenario runner
//!
//! Replays a JSON scenario against a pool with an attached system executor
//! and prints a JSON report of the live bindings after every step.
//!
//! ## Startup Sequence
//!
//! 1. Resolve the scenario path (argument, else `REFLEX_SCENARIO`).
//! 2. Register the declared systems.
//! 3. Apply each step, routing the pool events it causes.
//! 4. Detach the executor and print the report.

mod runner;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use runner::Runner;
use scenario::Scenario;

#[derive(Parser)]
#[command(name = "reflex_app", about = "Replay a reactive system scenario against a pool")]
struct Args {
    /// Path to the JSON scenario file (defaults to $REFLEX_SCENARIO)
    scenario: Option<PathBuf>,

    /// Log filter directives, overriding RUST_LOG
    #[arg(short, long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::from_default_env().add_directive("reflex_app=info".parse()?),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let path = args
        .scenario
        .or_else(|| std::env::var_os("REFLEX_SCENARIO").map(PathBuf::from))
        .context("no scenario given; pass a path or set REFLEX_SCENARIO")?;

    let scenario = Scenario::load(&path)?;
    info!(
        path = %path.display(),
        systems = scenario.systems.len(),
        steps = scenario.steps.len(),
        "scenario loaded"
    );

    let report = Runner::run(&scenario)?;
    info!(released = report.released, "scenario finished");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
