//! Unified error types for the mzcompose workspace.
//!
//! Every failure the engine can surface to a workflow author lives here.
//! Each variant renders a human-readable message, and [`ComposeError::hint`]
//! provides an optional remediation hint for the ones a user can act on.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The requested composition is not registered in the repository.
    #[error("unknown composition {name:?}")]
    UnknownComposition {
        /// Name that was looked up.
        name: String,
    },

    /// A service references a build target that the image repository does not know.
    #[error("unknown build target {name:?}")]
    UnknownBuildTarget {
        /// Build reference that failed to resolve.
        name: String,
    },

    /// A service binds a fixed host port without opting in.
    #[error("disallowed host port {port:?} in service {service:?}")]
    DisallowedHostPort {
        /// Offending service.
        service: String,
        /// Port entry as declared.
        port: String,
    },

    /// An override referenced a service that is not part of the composition.
    #[error("service {name:?} does not exist in the composition")]
    UnknownService {
        /// Service name that was not found.
        name: String,
    },

    /// A service was declared more than once while loading a composition.
    #[error("service {name:?} specified more than once")]
    DuplicateService {
        /// Duplicated service name.
        name: String,
    },

    /// Two composition directories share a name.
    #[error("composition {name:?} is defined in both {} and {}", first.display(), second.display())]
    DuplicateComposition {
        /// Duplicated composition name.
        name: String,
        /// First directory registered under the name.
        first: PathBuf,
        /// Second directory that collided.
        second: PathBuf,
    },

    /// A test case name was reused within the lifetime of a composition.
    #[error("test case {name:?} executed twice")]
    DuplicateTestCase {
        /// Reused test case name.
        name: String,
    },

    /// The runtime reported no host mapping for the requested private port.
    #[error("service {service:?} is not exposing port {port:?}")]
    PortNotExposed {
        /// Service that was queried.
        service: String,
        /// Private port that was queried.
        port: String,
    },

    /// The service declares no ports, so there is no default port.
    #[error("service {service:?} does not expose any ports")]
    NoPortsDeclared {
        /// Service that was queried.
        service: String,
    },

    /// A workflow received arguments it does not recognize.
    #[error("workflow {workflow:?}: unrecognized arguments: {}", args.join(" "))]
    UnrecognizedArgument {
        /// Workflow being invoked.
        workflow: String,
        /// The arguments that were rejected.
        args: Vec<String>,
    },

    /// A workflow's arguments were recognized but malformed.
    #[error("workflow {workflow:?}: {message}")]
    InvalidArguments {
        /// Workflow being invoked.
        workflow: String,
        /// Rendered parser diagnostic.
        message: String,
    },

    /// A workflow's help text was requested instead of running it.
    #[error("{usage}")]
    HelpRequested {
        /// Rendered help text.
        usage: String,
    },

    /// No workflow is registered under the requested name.
    #[error("unknown workflow {name:?}")]
    UnknownWorkflow {
        /// Workflow name that was looked up.
        name: String,
    },

    /// A readiness poll never observed a satisfying result.
    #[error("never got correct result for {target}: {}", last_error.as_deref().unwrap_or("no attempt completed"))]
    ReadinessTimeout {
        /// Human-readable description of the probed target.
        target: String,
        /// Most recent error observed while polling.
        last_error: Option<String>,
    },

    /// The external container runtime exited unsuccessfully.
    #[error("running {command} failed (exit status {})", exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    RuntimeInvocationFailed {
        /// Program and subcommand that was run, e.g. `docker compose up`.
        command: String,
        /// Exit code, absent when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// The external container runtime could not be spawned at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The external container runtime is not installed on this host.
    #[error("container runtime {program:?} is not available")]
    RuntimeUnavailable {
        /// Program that was looked up.
        program: String,
    },

    /// A build dependency could not be made available to the runtime.
    #[error("failed to acquire image {image}: {message}")]
    Acquisition {
        /// Concrete image reference being acquired.
        image: String,
        /// Description of the failure.
        message: String,
    },

    /// A scoped body panicked; the panic was contained and reported.
    #[error("panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// YAML serialization or deserialization failed.
    #[error("YAML error: {source}")]
    Yaml {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

impl ComposeError {
    /// Returns a remediation hint for errors the user can fix directly.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DisallowedHostPort { .. } => Some(
                "add `allow_host_ports: true` to the service config to disable this check",
            ),
            Self::PortNotExposed { .. } => Some("is the service running?"),
            Self::UnknownComposition { .. } => {
                Some("run `mzcompose list-compositions` to see the available compositions")
            }
            Self::UnknownWorkflow { .. } => {
                Some("run `mzcompose list-workflows` to see the available workflows")
            }
            Self::UnknownService { .. } => {
                Some("overrides may only replace services that the composition already defines")
            }
            Self::Spawn { .. } | Self::RuntimeUnavailable { .. } => {
                Some("is docker installed and on your PATH?")
            }
            _ => None,
        }
    }

    /// Returns whether this error is a help request rather than a failure.
    #[must_use]
    pub const fn is_help(&self) -> bool {
        matches!(self, Self::HelpRequested { .. })
    }

    /// Builds a [`ComposeError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ComposeError>;
