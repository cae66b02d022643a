//! # mzcompose
//!
//! Runs the workflows of a composition against `docker compose`.

use std::process::ExitCode;
use std::sync::Arc;

use mzcompose_runtime::loader::YamlManifestLoader;

fn main() -> ExitCode {
    match mzcompose_cli::run_with_loader(std::env::args_os(), Arc::new(YamlManifestLoader)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("{}", mzcompose_cli::output::render_error(&err));
            }
            ExitCode::FAILURE
        }
    }
}
