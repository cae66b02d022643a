//! `mzcompose stop`: stop services.

use clap::Args;

use super::as_strs;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Services to stop. If empty, stops all.
    pub services: Vec<String>,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the runtime fails.
pub fn execute(args: StopArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load_live()?;
    composition.stop(&as_strs(&args.services))?;
    Ok(())
}
