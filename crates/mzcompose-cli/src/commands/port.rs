//! `mzcompose port`: print the host port mapped to a service port.

use clap::Args;

/// Arguments for the `port` command.
#[derive(Args, Debug)]
pub struct PortArgs {
    /// Service name.
    pub service: String,

    /// Container port. Defaults to the first port the service declares.
    pub port: Option<String>,
}

/// Executes the `port` command.
///
/// # Errors
///
/// Returns an error if the port is not exposed.
pub fn execute(args: PortArgs, ctx: &super::Context) -> anyhow::Result<()> {
    let composition = ctx.load_live()?;
    let port = match &args.port {
        Some(private) => composition.port(&args.service, private)?,
        None => composition.default_port(&args.service)?,
    };
    println!("{port}");
    Ok(())
}
