//! `mzcompose config`: print the rendered compose file.

use clap::Args;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

/// Executes the `config` command.
///
/// # Errors
///
/// Returns an error if the composition cannot be loaded or rendered.
pub fn execute(_args: ConfigArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load()?;
    print!("{}", composition.rendered()?);
    Ok(())
}
