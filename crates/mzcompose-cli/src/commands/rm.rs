//! `mzcompose rm`: remove stopped service containers.

use clap::Args;
use mzcompose_runtime::composition::RmOptions;

use super::as_strs;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Services whose containers to remove. If empty, removes all.
    pub services: Vec<String>,

    /// Do not stop running containers first.
    #[arg(long)]
    pub no_stop: bool,

    /// Keep anonymous volumes attached to the containers.
    #[arg(long)]
    pub keep_volumes: bool,

    /// Also remove these named volumes of the composition.
    #[arg(long = "volume", value_name = "VOLUME")]
    pub volumes: Vec<String>,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the runtime fails.
pub fn execute(args: RmArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load_live()?;
    composition.rm(
        &as_strs(&args.services),
        RmOptions {
            stop: !args.no_stop,
            destroy_volumes: !args.keep_volumes,
        },
    )?;
    if !args.volumes.is_empty() {
        composition.rm_volumes(&as_strs(&args.volumes), true)?;
    }
    Ok(())
}
