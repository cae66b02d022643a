//! Container runtime abstraction.
//!
//! A [`ComposeRuntime`] executes one [`Invocation`] against a rendered
//! specification file and reports what happened. It never interprets exit
//! codes; deciding whether a failure is fatal belongs to the caller.

pub mod docker;
pub mod fake;

use std::fmt;
use std::path::Path;

use mzcompose_common::error::Result;

/// Which external program an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// `docker compose`, qualified by the project file and directory.
    Compose,
    /// Plain `docker`, for commands outside the compose project such as
    /// volume removal.
    Docker,
}

/// One command to run against a composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Target program.
    pub program: Program,
    /// Arguments after the program (and its project flags).
    pub args: Vec<String>,
    /// Capture standard output instead of inheriting it.
    pub capture_stdout: bool,
    /// Capture standard error instead of inheriting it.
    pub capture_stderr: bool,
    /// Text supplied on standard input.
    pub stdin: Option<String>,
    /// Treat a non-zero exit as an error.
    pub check: bool,
}

impl Invocation {
    fn new<I, S>(program: Program, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
            capture_stdout: false,
            capture_stderr: false,
            stdin: None,
            check: true,
        }
    }

    /// A `docker compose` subcommand.
    pub fn compose<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Program::Compose, args)
    }

    /// A plain `docker` subcommand.
    pub fn docker<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Program::Docker, args)
    }

    /// Sets whether standard output is captured.
    #[must_use]
    pub const fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Sets whether standard error is captured.
    #[must_use]
    pub const fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Supplies standard input.
    #[must_use]
    pub fn stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }

    /// Sets whether a non-zero exit is an error.
    #[must_use]
    pub const fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// The subcommand, i.e. the first argument.
    #[must_use]
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = match self.program {
            Program::Compose => "docker compose",
            Program::Docker => "docker",
        };
        write!(f, "{program}")?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where a composition lives, as seen by the runtime.
#[derive(Debug, Clone, Copy)]
pub struct Project<'a> {
    /// Rendered specification file.
    pub file: &'a Path,
    /// Directory relative paths in the specification resolve against.
    pub directory: &'a Path,
    /// Explicit project name, if any.
    pub name: Option<&'a str>,
}

/// What a finished invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// Captured standard output; empty when not captured.
    pub stdout: String,
    /// Captured standard error; empty when not captured.
    pub stderr: String,
    /// Exit code, absent when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl InvocationOutput {
    /// A successful run with the given standard output.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// A failed run with the given exit code.
    #[must_use]
    pub const fn failure(exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        }
    }

    /// Returns whether the process exited zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Executes invocations against a rendered composition.
pub trait ComposeRuntime: Send + Sync + fmt::Debug {
    /// Runs `invocation` for `project` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be run at all; a
    /// non-zero exit is reported through [`InvocationOutput::exit_code`].
    fn invoke(&self, project: &Project<'_>, invocation: &Invocation) -> Result<InvocationOutput>;

    /// Returns whether the runtime is usable on this host.
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_displays_as_command_line() {
        let inv = Invocation::compose(["up", "--detach", "materialized"]);
        assert_eq!(inv.to_string(), "docker compose up --detach materialized");
        let inv = Invocation::docker(["volume", "rm", "demo_pgdata"]);
        assert_eq!(inv.to_string(), "docker volume rm demo_pgdata");
    }

    #[test]
    fn invocation_defaults_to_checked_and_uncaptured() {
        let inv = Invocation::compose(["ps"]);
        assert!(inv.check);
        assert!(!inv.capture_stdout);
        assert!(!inv.capture_stderr);
        assert_eq!(inv.stdin, None);
        assert_eq!(inv.subcommand(), Some("ps"));
    }

    #[test]
    fn only_exit_zero_is_success() {
        assert!(InvocationOutput::success("").is_success());
        assert!(!InvocationOutput::failure(1).is_success());
        assert!(!InvocationOutput::default().is_success());
    }
}
