//! `mzcompose up`: start services.

use clap::Args;
use mzcompose_runtime::composition::UpOptions;

use super::as_strs;

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Services to start. If empty, starts all.
    pub services: Vec<String>,

    /// Idle every container on `sleep infinity` instead of its entrypoint.
    #[arg(long)]
    pub persistent: bool,

    /// Return without waiting for health checks.
    #[arg(long)]
    pub no_wait: bool,
}

impl UpArgs {
    /// Up options selected by the flags.
    #[must_use]
    pub const fn options(&self) -> UpOptions {
        UpOptions {
            detach: true,
            wait: !self.no_wait,
            persistent: self.persistent,
        }
    }
}

/// Executes the `up` command.
///
/// # Errors
///
/// Returns an error if images cannot be acquired or the runtime fails.
pub fn execute(args: UpArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let mut composition = ctx.load_live()?;
    composition.acquire()?;
    composition.up(&as_strs(&args.services), args.options())?;
    Ok(())
}
