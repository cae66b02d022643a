//! Named workflows and their argument parsing.
//!
//! A workflow is an opaque unit of orchestration behavior registered by a
//! manifest. Its shape is fixed at registration: [`Workflow::Plain`] takes
//! only the composition, [`Workflow::WithArgs`] also receives a
//! [`WorkflowArgumentParser`] bound to the invocation's own arguments.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use clap::error::{ContextKind, ContextValue, ErrorKind};
use mzcompose_common::constants::{BIN_NAME, WORKFLOW_PREFIX};
use mzcompose_common::error::{ComposeError, Result};

use crate::composition::Composition;

/// Body of a workflow that takes no arguments.
pub type PlainFn = Arc<dyn Fn(&mut Composition) -> Result<()> + Send + Sync>;

/// Body of a workflow that parses its own arguments.
pub type WithArgsFn =
    Arc<dyn Fn(&mut Composition, WorkflowArgumentParser) -> Result<()> + Send + Sync>;

/// A registered workflow.
#[derive(Clone)]
pub enum Workflow {
    /// Rejects any arguments, then runs.
    Plain {
        /// One-line description shown in listings and help.
        doc: Option<String>,
        /// Workflow body.
        run: PlainFn,
    },
    /// Receives a parser and decides on its own arguments.
    WithArgs {
        /// One-line description shown in listings and help.
        doc: Option<String>,
        /// Workflow body.
        run: WithArgsFn,
    },
}

impl Workflow {
    /// Wraps a body that takes no arguments.
    pub fn plain<F>(run: F) -> Self
    where
        F: Fn(&mut Composition) -> Result<()> + Send + Sync + 'static,
    {
        Self::Plain {
            doc: None,
            run: Arc::new(run),
        }
    }

    /// Wraps a body that parses its own arguments.
    pub fn with_args<F>(run: F) -> Self
    where
        F: Fn(&mut Composition, WorkflowArgumentParser) -> Result<()> + Send + Sync + 'static,
    {
        Self::WithArgs {
            doc: None,
            run: Arc::new(run),
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_doc(self, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match self {
            Self::Plain { run, .. } => Self::Plain { doc: text, run },
            Self::WithArgs { run, .. } => Self::WithArgs { doc: text, run },
        }
    }

    /// The description, if any.
    #[must_use]
    pub fn doc(&self) -> Option<&str> {
        match self {
            Self::Plain { doc, .. } | Self::WithArgs { doc, .. } => doc.as_deref(),
        }
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Self::Plain { .. } => "Plain",
            Self::WithArgs { .. } => "WithArgs",
        };
        f.debug_struct("Workflow")
            .field("shape", &shape)
            .field("doc", &self.doc())
            .finish_non_exhaustive()
    }
}

/// How a dispatched workflow finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// The body ran to completion.
    Completed,
    /// Help was requested; the body did not run (or stopped at parsing).
    HelpShown(String),
}

/// Converts a registration symbol such as `workflow_test_upgrade` into its
/// dispatch name, `test-upgrade`. Symbols without the prefix yield `None`.
#[must_use]
pub fn workflow_name(symbol: &str) -> Option<String> {
    symbol
        .strip_prefix(WORKFLOW_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.replace('_', "-"))
}

/// Workflows of one composition, keyed by dispatch name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowTable {
    workflows: BTreeMap<String, Workflow>,
}

impl WorkflowTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workflow under an already normalized name, replacing any
    /// previous registration.
    pub fn insert(&mut self, name: impl Into<String>, workflow: Workflow) {
        let _ = self.workflows.insert(name.into(), workflow);
    }

    /// Registers a workflow under a prefixed symbol; see [`workflow_name`].
    ///
    /// Returns `false`, registering nothing, if the symbol is not eligible.
    pub fn register_symbol(&mut self, symbol: &str, workflow: Workflow) -> bool {
        match workflow_name(symbol) {
            Some(name) => {
                self.insert(name, workflow);
                true
            }
            None => {
                tracing::debug!(%symbol, "ignoring symbol without workflow prefix");
                false
            }
        }
    }

    /// Looks up a workflow.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Workflow> {
        self.workflows.get(name)
    }

    /// Returns whether a workflow is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Iterates over `(name, workflow)` pairs, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Workflow)> {
        self.workflows.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered workflows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    /// Returns whether no workflows are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// An argument parser scoped to one workflow invocation.
///
/// Add arguments with [`arg`](Self::arg), then call [`parse`](Self::parse);
/// the parser already knows the arguments the user supplied.
#[derive(Debug, Clone)]
pub struct WorkflowArgumentParser {
    workflow: String,
    command: clap::Command,
    args: Vec<String>,
}

impl WorkflowArgumentParser {
    /// Creates a parser for `workflow` over `args`.
    #[must_use]
    pub fn new(workflow: &str, doc: Option<&str>, args: Vec<String>) -> Self {
        let mut command = clap::Command::new(workflow.to_string())
            .bin_name(format!("{BIN_NAME} run {workflow}"))
            .no_binary_name(true)
            .disable_version_flag(true);
        if let Some(doc) = doc {
            command = command.about(doc.to_string());
        }
        Self {
            workflow: workflow.to_string(),
            command,
            args,
        }
    }

    /// Adds an argument definition.
    #[must_use]
    pub fn arg(mut self, arg: clap::Arg) -> Self {
        self.command = self.command.arg(arg);
        self
    }

    /// The raw arguments supplied to this invocation.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Rendered help text.
    #[must_use]
    pub fn help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Parses the invocation's arguments.
    ///
    /// # Errors
    ///
    /// - [`ComposeError::HelpRequested`] if `--help` was given.
    /// - [`ComposeError::UnrecognizedArgument`] for arguments the parser
    ///   does not know.
    /// - [`ComposeError::InvalidArguments`] for any other parse failure.
    pub fn parse(&self) -> Result<clap::ArgMatches> {
        self.command
            .clone()
            .try_get_matches_from(&self.args)
            .map_err(|e| self.translate(&e))
    }

    fn translate(&self, err: &clap::Error) -> ComposeError {
        match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            | ErrorKind::DisplayVersion => ComposeError::HelpRequested {
                usage: err.render().to_string(),
            },
            ErrorKind::UnknownArgument => {
                let args = match err.get(ContextKind::InvalidArg) {
                    Some(ContextValue::String(arg)) => vec![arg.clone()],
                    Some(ContextValue::Strings(args)) => args.clone(),
                    _ => self.args.clone(),
                };
                ComposeError::UnrecognizedArgument {
                    workflow: self.workflow.clone(),
                    args,
                }
            }
            _ => ComposeError::InvalidArguments {
                workflow: self.workflow.clone(),
                message: err.render().to_string().trim_end().to_string(),
            },
        }
    }
}
