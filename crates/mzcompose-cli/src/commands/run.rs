//! `mzcompose run`: run a workflow, or a one-off container for a service.
//!
//! A name that is not a workflow but is a service runs that service's
//! container with the remaining arguments, and removes it afterwards.

use std::path::Path;

use anyhow::Context as _;
use clap::Args;
use mzcompose_common::error::ComposeError;
use mzcompose_runtime::composition::RunOptions;
use mzcompose_runtime::{Composition, WorkflowOutcome};

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow to run, or a service to start a one-off container for.
    pub target: String,

    /// Arguments passed through to the workflow or the container.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Runs `target` against `composition`.
///
/// # Errors
///
/// Returns [`ComposeError::RuntimeUnavailable`] if docker is not installed,
/// [`ComposeError::UnknownWorkflow`] if `target` names neither a workflow
/// nor a service, or whatever the workflow or container returns.
pub fn run_target(
    composition: &mut Composition,
    target: &str,
    args: &[String],
) -> mzcompose_common::error::Result<WorkflowOutcome> {
    composition.ensure_runtime()?;
    if composition.workflows().contains(target) {
        composition.acquire()?;
        return composition.workflow(target, args);
    }
    if composition.spec().contains(target) {
        tracing::info!(service = %target, "no workflow of that name, running service");
        composition.acquire()?;
        let options = RunOptions {
            rm: true,
            ..RunOptions::default()
        };
        let _ = composition.run(target, args.iter().cloned(), options)?;
        return Ok(WorkflowOutcome::Completed);
    }
    Err(ComposeError::UnknownWorkflow {
        name: target.to_string(),
    })
}

/// Writes the test summary to `results_file` if requested, and fails if any
/// test case failed.
///
/// # Errors
///
/// Returns an error naming the failed test cases, or if the summary cannot
/// be written.
pub fn finish(composition: &Composition, results_file: Option<&Path>) -> anyhow::Result<()> {
    let summary = composition.summary();
    if let Some(path) = results_file {
        std::fs::write(path, summary.to_json()?)
            .with_context(|| format!("writing test results to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote test results");
    }
    if summary.cases.is_empty() {
        return Ok(());
    }
    println!("{}", output::format_summary(&summary));
    let failed = composition.failed_test_cases();
    if !failed.is_empty() {
        anyhow::bail!("test case(s) failed: {}", failed.join(", "));
    }
    Ok(())
}

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if loading fails, the target fails, or any test case
/// failed.
pub fn execute(args: RunArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let mut composition = ctx.load()?;
    let outcome = run_target(&mut composition, &args.target, &args.args);
    let finished = finish(&composition, ctx.results_file());
    match outcome? {
        WorkflowOutcome::HelpShown(text) => print!("{text}"),
        WorkflowOutcome::Completed => {}
    }
    finished
}
