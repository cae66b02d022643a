//! `mzcompose list-workflows`: list the workflows of a composition.

use clap::Args;
use mzcompose_runtime::Composition;

use crate::output;

/// Arguments for the `list-workflows` command.
#[derive(Args, Debug)]
pub struct ListWorkflowsArgs {}

/// Formats each workflow with the first line of its description.
#[must_use]
pub fn render(composition: &Composition) -> String {
    output::format_listing(composition.workflows().iter().map(|(n, w)| (n, w.doc())))
}

/// Executes the `list-workflows` command.
///
/// # Errors
///
/// Returns an error if the composition cannot be loaded.
pub fn execute(_args: ListWorkflowsArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load()?;
    print!("{}", render(&composition));
    Ok(())
}
