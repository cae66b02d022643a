//! `mzcompose list-compositions`: list every composition in the source tree.

use clap::Args;
use mzcompose_runtime::Repository;

use crate::output;

/// Arguments for the `list-compositions` command.
#[derive(Args, Debug)]
pub struct ListCompositionsArgs {}

/// Formats the compositions of `repo` with their directories relative to
/// the root.
#[must_use]
pub fn render(repo: &Repository) -> String {
    let rows: Vec<(String, String)> = repo
        .compositions()
        .map(|(name, path)| {
            let shown = path.strip_prefix(repo.root()).unwrap_or(path);
            (name.to_string(), shown.display().to_string())
        })
        .collect();
    output::format_listing(rows.iter().map(|(n, p)| (n.as_str(), Some(p.as_str()))))
}

/// Executes the `list-compositions` command.
///
/// # Errors
///
/// This command does not fail once the repository is discovered.
pub fn execute(_args: ListCompositionsArgs, ctx: &super::Context) -> anyhow::Result<()> {
    print!("{}", render(ctx.repository()));
    Ok(())
}
