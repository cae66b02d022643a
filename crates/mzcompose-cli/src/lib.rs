//! # mzcompose: composition CLI
//!
//! Loads a composition from the source tree and drives it through
//! `docker compose`. The binary serves YAML manifests; embedding test
//! programs call [`run_with_loader`] with their own [`ManifestLoader`] to
//! register services and workflows defined in Rust.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod commands;
pub mod output;

use std::ffi::OsString;
use std::sync::Arc;

use clap::Parser;
use mzcompose_runtime::ManifestLoader;

use crate::commands::{Cli, LogFormat};

/// Parses `args`, installs logging, and executes the selected command.
///
/// Pass a [`ChainLoader`](mzcompose_runtime::loader::ChainLoader) to serve
/// programmatic manifests with a YAML fallback.
///
/// # Errors
///
/// Returns an error if argument parsing bails out for a reason other than
/// help or version output, or if the command fails.
pub fn run_with_loader<I, T>(args: I, loader: Arc<dyn ManifestLoader>) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.log_format);
    commands::execute(cli, loader)
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // A second initialization (an embedder that already installed a
    // subscriber) keeps the existing one.
    let _ = match format {
        LogFormat::Text => builder.without_time().with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
