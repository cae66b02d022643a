//! `mzcompose down`: stop and remove everything the composition created.

use clap::Args;
use mzcompose_runtime::composition::DownOptions;

/// Arguments for the `down` command.
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Keep named volumes.
    #[arg(long)]
    pub keep_volumes: bool,
}

/// Executes the `down` command.
///
/// # Errors
///
/// Returns an error if the runtime fails.
pub fn execute(args: DownArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load_live()?;
    composition.down(DownOptions {
        destroy_volumes: !args.keep_volumes,
        ..DownOptions::default()
    })?;
    Ok(())
}
