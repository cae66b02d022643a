//! # mzcompose-runtime
//!
//! Drives a live composition through an external compose runtime.
//!
//! Handles:
//! - **Backend**: The invocation boundary to `docker compose`, plus a
//!   recording fake for tests.
//! - **Composition**: The live specification, lifecycle commands, scoped
//!   overrides, and the test-case harness.
//! - **Loader**: Manifests of services and workflows for a composition.
//! - **Workflow**: Named workflows and their per-invocation argument parsers.
//! - **Poll**: Bounded readiness polling.
//! - **Repository**: Discovery of the compositions in a source tree.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod composition;
pub mod loader;
pub mod poll;
pub mod repository;
pub mod workflow;

pub use backend::{ComposeRuntime, Invocation, InvocationOutput};
pub use composition::{Composition, TestResult, TestSummary};
pub use loader::{Manifest, ManifestLoader};
pub use repository::Repository;
pub use workflow::{Workflow, WorkflowArgumentParser, WorkflowOutcome, WorkflowTable};
