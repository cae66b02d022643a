//! `mzcompose describe`: describe a composition's services and workflows.

use std::fmt::Write as _;

use clap::Args;
use mzcompose_runtime::Composition;

use crate::output;

/// Arguments for the `describe` command.
#[derive(Args, Debug)]
pub struct DescribeArgs {}

/// Formats the description, services, and workflows of `composition`.
#[must_use]
pub fn render(composition: &Composition) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Composition: {}", composition.name());
    if let Some(description) = composition.description() {
        let _ = writeln!(out, "\n{}", description.trim_end());
    }

    let services: Vec<(&str, Option<&str>)> = composition
        .spec()
        .services
        .iter()
        .map(|(name, config)| (name.as_str(), config.image.as_deref()))
        .collect();
    let _ = writeln!(out, "\nServices:");
    if services.is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        out.push_str(&output::format_listing(services));
    }

    let _ = writeln!(out, "\nWorkflows:");
    if composition.workflows().is_empty() {
        let _ = writeln!(out, "(none)");
    } else {
        out.push_str(&output::format_listing(
            composition.workflows().iter().map(|(n, w)| (n, w.doc())),
        ));
    }
    out
}

/// Executes the `describe` command.
///
/// # Errors
///
/// Returns an error if the composition cannot be loaded.
pub fn execute(_args: DescribeArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load()?;
    print!("{}", render(&composition));
    Ok(())
}
