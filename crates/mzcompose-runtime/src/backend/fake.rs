//! In-memory runtime that records invocations instead of running them.
//!
//! Every invocation is stored together with the specification file contents
//! at the moment it ran, which lets tests observe exactly what the runtime
//! would have seen. Outputs can be scripted per subcommand; anything
//! unscripted succeeds with empty output.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use mzcompose_common::error::{ComposeError, Result};

use super::{ComposeRuntime, Invocation, InvocationOutput, Project};

/// One invocation observed by a [`RecordingRuntime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvocation {
    /// The invocation as issued.
    pub invocation: Invocation,
    /// Specification file contents when the invocation ran.
    pub rendered: String,
    /// Explicit project name, if any.
    pub project_name: Option<String>,
}

impl RecordedInvocation {
    /// The invocation's arguments joined by spaces.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.invocation.args.join(" ")
    }
}

/// A [`ComposeRuntime`] for tests.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<RecordedInvocation>>,
    scripted: Mutex<BTreeMap<String, VecDeque<InvocationOutput>>>,
    missing: bool,
}

impl RecordingRuntime {
    /// Creates a runtime with no scripted outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports the runtime as not installed.
    #[must_use]
    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    /// Queues `output` for the next invocation of `subcommand`.
    pub fn respond(&self, subcommand: &str, output: InvocationOutput) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subcommand.to_string())
            .or_default()
            .push_back(output);
    }

    /// Every invocation so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Argument lines of every invocation so far, in order.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .map(RecordedInvocation::command_line)
            .collect()
    }

    /// Forgets recorded invocations. Scripted outputs are kept.
    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ComposeRuntime for RecordingRuntime {
    fn invoke(&self, project: &Project<'_>, invocation: &Invocation) -> Result<InvocationOutput> {
        let rendered =
            std::fs::read_to_string(project.file).map_err(|e| ComposeError::io(project.file, e))?;
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedInvocation {
                invocation: invocation.clone(),
                rendered,
                project_name: project.name.map(str::to_string),
            });

        let scripted = invocation.subcommand().and_then(|sub| {
            self.scripted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(sub)
                .and_then(VecDeque::pop_front)
        });
        Ok(scripted.unwrap_or_else(|| InvocationOutput::success("")))
    }

    fn is_available(&self) -> bool {
        !self.missing
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn records_invocations_with_file_contents() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        std::fs::write(file.path(), "version: '3.7'\n").expect("write");
        let project = Project {
            file: file.path(),
            directory: Path::new("."),
            name: Some("demo"),
        };
        let runtime = RecordingRuntime::new();
        let _ = runtime
            .invoke(&project, &Invocation::compose(["up", "--detach"]))
            .expect("invoke");

        let calls = runtime.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].command_line(), "up --detach");
        assert_eq!(calls[0].rendered, "version: '3.7'\n");
        assert_eq!(calls[0].project_name.as_deref(), Some("demo"));
    }

    #[test]
    fn availability_can_be_switched_off() {
        assert!(RecordingRuntime::new().is_available());
        assert!(!RecordingRuntime::new().missing().is_available());
    }

    #[test]
    fn scripted_outputs_are_consumed_in_order() {
        let file = tempfile::NamedTempFile::new().expect("tempfile");
        let project = Project {
            file: file.path(),
            directory: Path::new("."),
            name: None,
        };
        let runtime = RecordingRuntime::new();
        runtime.respond("port", InvocationOutput::success("0.0.0.0:49153\n"));
        runtime.respond("port", InvocationOutput::failure(1));

        let inv = Invocation::compose(["port", "postgres", "5432"]);
        let first = runtime.invoke(&project, &inv).expect("first");
        let second = runtime.invoke(&project, &inv).expect("second");
        let third = runtime.invoke(&project, &inv).expect("third");
        assert_eq!(first.stdout, "0.0.0.0:49153\n");
        assert!(!second.is_success());
        assert!(third.is_success());
        assert!(third.stdout.is_empty());
    }
}
