//! `mzcompose kill`: send a signal to services.

use clap::Args;
use mzcompose_common::constants::DEFAULT_KILL_SIGNAL;

use super::as_strs;

/// Arguments for the `kill` command.
#[derive(Args, Debug)]
pub struct KillArgs {
    /// Services to signal. If empty, signals all.
    pub services: Vec<String>,

    /// Signal to deliver.
    #[arg(short, long, default_value = DEFAULT_KILL_SIGNAL)]
    pub signal: String,
}

/// Executes the `kill` command.
///
/// # Errors
///
/// Returns an error if the runtime fails.
pub fn execute(args: KillArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load_live()?;
    composition.kill(&as_strs(&args.services), Some(&args.signal))?;
    Ok(())
}
