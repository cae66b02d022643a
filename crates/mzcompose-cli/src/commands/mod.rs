//! CLI command definitions and dispatch.

pub mod config;
pub mod describe;
pub mod down;
pub mod kill;
pub mod list_compositions;
pub mod list_workflows;
pub mod port;
pub mod rm;
pub mod run;
pub mod stop;
pub mod up;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use mzcompose_common::config::EngineConfig;
use mzcompose_common::constants::BIN_NAME;
use mzcompose_runtime::loader::LoadContext;
use mzcompose_runtime::{Composition, ManifestLoader, Repository};

/// Orchestrate test compositions on top of docker compose.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Composition to operate on, by name. Defaults to the composition in
    /// the current directory.
    #[arg(long, global = true, value_name = "COMPOSITION")]
    pub find: Option<String>,

    /// Root of the source tree searched for compositions and images.
    #[arg(long, global = true, env = "MZCOMPOSE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Bind every container port to the same port on the host.
    #[arg(long, global = true, env = "MZCOMPOSE_PRESERVE_PORTS")]
    pub preserve_ports: bool,

    /// Collect code coverage from instrumented services.
    #[arg(long, global = true, env = "MZCOMPOSE_COVERAGE")]
    pub coverage: bool,

    /// Explicit project name for the runtime.
    #[arg(long, global = true, env = "MZCOMPOSE_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// Never pull images from a registry.
    #[arg(long, global = true, env = "MZCOMPOSE_OFFLINE")]
    pub offline: bool,

    /// Write a JSON summary of the test cases to this file after `run`.
    #[arg(long, global = true, value_name = "PATH")]
    pub results_file: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Formats for log output on standard error.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every composition in the source tree.
    ListCompositions(list_compositions::ListCompositionsArgs),
    /// List the workflows of a composition.
    ListWorkflows(list_workflows::ListWorkflowsArgs),
    /// Describe a composition's services and workflows.
    Describe(describe::DescribeArgs),
    /// Print the rendered compose file.
    Config(config::ConfigArgs),
    /// Run a workflow, or a one-off container for a service.
    Run(run::RunArgs),
    /// Start services.
    Up(up::UpArgs),
    /// Stop and remove everything the composition created.
    Down(down::DownArgs),
    /// Print the host port mapped to a service port.
    Port(port::PortArgs),
    /// Stop services.
    Stop(stop::StopArgs),
    /// Send a signal to services.
    Kill(kill::KillArgs),
    /// Remove stopped service containers.
    Rm(rm::RmArgs),
}

impl Cli {
    /// Engine configuration selected by the global flags.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            preserve_ports: self.preserve_ports,
            coverage: self.coverage,
            project_name: self.project_name.clone(),
            offline: self.offline,
            ..EngineConfig::default()
        }
    }
}

/// State shared by every command: the discovered repository and the
/// selected composition.
pub struct Context {
    repo: Repository,
    composition: Option<String>,
    results_file: Option<PathBuf>,
}

impl Context {
    /// Discovers the repository under the `--root` flag and selects the
    /// composition named by `--find`, or the one in `cwd`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be resolved or discovery fails.
    pub fn new(cli: &Cli, cwd: &Path, loader: Arc<dyn ManifestLoader>) -> anyhow::Result<Self> {
        let root = cli
            .root
            .canonicalize()
            .with_context(|| format!("resolving root {}", cli.root.display()))?;
        let mut repo = Repository::discover(&root, cli.engine_config())?.with_loader(loader);

        let composition = if let Some(name) = &cli.find {
            Some(name.clone())
        } else {
            let cwd = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
            let found = repo
                .compositions()
                .find(|(_, p)| *p == cwd)
                .map(|(n, _)| n.to_string());
            match found {
                Some(name) => Some(name),
                None => Self::programmatic(&mut repo, &cwd)?,
            }
        };
        tracing::debug!(root = %root.display(), composition = ?composition, "selected composition");

        Ok(Self {
            repo,
            composition,
            results_file: cli.results_file.clone(),
        })
    }

    /// Registers `cwd` under its directory name if the loader serves a
    /// manifest for it. Such compositions have no manifest file to discover.
    fn programmatic(repo: &mut Repository, cwd: &Path) -> anyhow::Result<Option<String>> {
        let Some(name) = cwd.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Ok(None);
        };
        if repo.compositions().any(|(n, _)| n == name) {
            return Ok(None);
        }
        let ctx = LoadContext {
            name: &name,
            path: cwd,
            config: repo.config(),
        };
        if repo.loader().load(&ctx)?.is_none() {
            return Ok(None);
        }
        repo.register(name.clone(), cwd)?;
        Ok(Some(name))
    }

    /// The discovered repository.
    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Name of the selected composition.
    ///
    /// # Errors
    ///
    /// Returns an error if no composition was selected.
    pub fn composition_name(&self) -> anyhow::Result<&str> {
        self.composition
            .as_deref()
            .context("no composition selected; pass --find <COMPOSITION>")
    }

    /// Loads the selected composition.
    ///
    /// # Errors
    ///
    /// Returns an error if no composition was selected or loading fails.
    pub fn load(&self) -> anyhow::Result<Composition> {
        Ok(Composition::load(&self.repo, self.composition_name()?)?)
    }

    /// Loads the selected composition for a command that drives the runtime,
    /// failing early if the runtime is not installed.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or the runtime is unavailable.
    pub fn load_live(&self) -> anyhow::Result<Composition> {
        let composition = self.load()?;
        composition.ensure_runtime()?;
        Ok(composition)
    }

    /// Where `run` writes its test summary, if requested.
    #[must_use]
    pub fn results_file(&self) -> Option<&Path> {
        self.results_file.as_deref()
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli, loader: Arc<dyn ManifestLoader>) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let ctx = Context::new(&cli, &cwd, loader)?;
    match cli.command {
        Command::ListCompositions(args) => list_compositions::execute(args, &ctx),
        Command::ListWorkflows(args) => list_workflows::execute(args, &ctx),
        Command::Describe(args) => describe::execute(args, &ctx),
        Command::Config(args) => config::execute(args, &ctx),
        Command::Run(args) => run::execute(args, &ctx),
        Command::Up(args) => up::execute(args, &ctx),
        Command::Down(args) => down::execute(args, &ctx),
        Command::Port(args) => port::execute(args, &ctx),
        Command::Stop(args) => stop::execute(args, &ctx),
        Command::Kill(args) => kill::execute(args, &ctx),
        Command::Rm(args) => rm::execute(args, &ctx),
    }
}

/// Borrows owned service names as the slice shape the composition expects.
pub(crate) fn as_strs(services: &[String]) -> Vec<&str> {
    services.iter().map(String::as_str).collect()
}
