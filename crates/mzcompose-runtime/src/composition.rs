//! The composition engine.
//!
//! A [`Composition`] owns one live [`Specification`], keeps its rendered form
//! on disk for the runtime, and issues lifecycle commands against it. Two
//! scoped operations mutate the live specification temporarily:
//! [`Composition::with_override`] and a persistent [`Composition::up`]. Both
//! restore the prior specification on every exit path, including panics, and
//! nest in stack order.
//!
//! [`Composition::test_case`] runs a body and records its outcome instead of
//! propagating failure, so one workflow can evaluate many independent checks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{Seek, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mzcompose_build::{BuildResolver, DependencySet};
use mzcompose_common::config::EngineConfig;
use mzcompose_common::constants::DEFAULT_KILL_SIGNAL;
use mzcompose_common::error::{ComposeError, Result};
use mzcompose_compose::{MungePolicy, Service, ServiceConfig, Specification, munge};
use serde::Serialize;

use crate::backend::{ComposeRuntime, Invocation, InvocationOutput, Program, Project};
use crate::loader::LoadContext;
use crate::poll;
use crate::repository::Repository;
use crate::workflow::{Workflow, WorkflowArgumentParser, WorkflowOutcome, WorkflowTable};

/// Outcome of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Wall-clock time the body took.
    pub duration: Duration,
    /// Failure description, absent on success.
    pub error: Option<String>,
}

impl TestResult {
    /// Returns whether the test case succeeded.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// One row of a [`TestSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseReport {
    /// Test case name.
    pub name: String,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Failure description, absent on success.
    pub error: Option<String>,
}

/// Machine-readable summary of every test case a composition ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    /// Composition name.
    pub composition: String,
    /// Number of passing test cases.
    pub passed: usize,
    /// Number of failing test cases.
    pub failed: usize,
    /// Every test case, in execution order.
    pub cases: Vec<TestCaseReport>,
}

impl TestSummary {
    /// Serializes the summary as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Options for [`Composition::up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpOptions {
    /// Run containers in the background.
    pub detach: bool,
    /// Wait for health checks before returning. Implies `detach`.
    pub wait: bool,
    /// Idle every container on `sleep infinity` so that later
    /// [`exec`](Composition::exec) calls can schedule work on it.
    pub persistent: bool,
}

impl Default for UpOptions {
    fn default() -> Self {
        Self {
            detach: true,
            wait: true,
            persistent: false,
        }
    }
}

/// Options for [`Composition::down`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownOptions {
    /// Remove named and anonymous volumes.
    pub destroy_volumes: bool,
    /// Remove containers for services no longer in the specification.
    pub remove_orphans: bool,
}

impl Default for DownOptions {
    fn default() -> Self {
        Self {
            destroy_volumes: true,
            remove_orphans: true,
        }
    }
}

/// Options for [`Composition::rm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmOptions {
    /// Stop containers first if necessary.
    pub stop: bool,
    /// Remove anonymous volumes attached to the containers.
    pub destroy_volumes: bool,
}

impl Default for RmOptions {
    fn default() -> Self {
        Self {
            stop: true,
            destroy_volumes: true,
        }
    }
}

/// Options for [`Composition::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Run the container in the background.
    pub detach: bool,
    /// Remove the container when it exits.
    pub rm: bool,
    /// Extra environment variables for the container.
    pub env_extra: BTreeMap<String, String>,
    /// Override the entrypoint.
    pub entrypoint: Option<String>,
    /// Capture standard output.
    pub capture_stdout: bool,
    /// Capture standard error.
    pub capture_stderr: bool,
    /// Text supplied on standard input.
    pub stdin: Option<String>,
    /// Treat a non-zero exit as an error.
    pub check: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            detach: false,
            rm: false,
            env_extra: BTreeMap::new(),
            entrypoint: None,
            capture_stdout: false,
            capture_stderr: false,
            stdin: None,
            check: true,
        }
    }
}

/// Options for [`Composition::exec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run the command in the background.
    pub detach: bool,
    /// Capture standard output.
    pub capture_stdout: bool,
    /// Capture standard error.
    pub capture_stderr: bool,
    /// Text supplied on standard input.
    pub stdin: Option<String>,
    /// Treat a non-zero exit as an error.
    pub check: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            detach: false,
            capture_stdout: false,
            capture_stderr: false,
            stdin: None,
            check: true,
        }
    }
}

/// A loaded composition.
pub struct Composition {
    name: String,
    path: PathBuf,
    description: Option<String>,
    config: EngineConfig,
    policy: MungePolicy,
    spec: Specification,
    dependencies: DependencySet,
    workflows: WorkflowTable,
    test_results: Vec<(String, TestResult)>,
    running_tests: BTreeSet<String>,
    resolver: Arc<dyn BuildResolver>,
    runtime: Arc<dyn ComposeRuntime>,
    file: tempfile::NamedTempFile,
}

impl Composition {
    /// Loads the composition `name` from `repo`.
    ///
    /// The manifest is loaded, munged (unless disabled in the configuration),
    /// and rendered. Build dependencies are resolved but not acquired; call
    /// [`acquire`](Self::acquire) before starting services.
    ///
    /// # Errors
    ///
    /// - [`ComposeError::UnknownComposition`] if `name` is not registered.
    /// - [`ComposeError::DuplicateService`] if the manifest repeats a service.
    /// - Any munging or I/O error.
    pub fn load(repo: &Repository, name: &str) -> Result<Self> {
        let path = repo.composition_path(name)?.to_path_buf();
        let config = repo.config().clone();
        let ctx = LoadContext {
            name,
            path: &path,
            config: &config,
        };
        let manifest = repo.loader().load(&ctx)?.unwrap_or_default();
        manifest.validate()?;

        let resolver = repo.resolver();
        let policy = MungePolicy::from_config(&config, repo.host_user());
        let (services, dependencies) = if config.munge_services {
            let munged = munge(&manifest.services, &policy, resolver.as_ref())?;
            (munged.services, munged.dependencies)
        } else {
            (manifest.services, DependencySet::empty())
        };
        let spec = Specification::from_services(services)?;

        let file = tempfile::Builder::new()
            .prefix("mzcompose-")
            .suffix(".yml")
            .tempfile()
            .map_err(|e| ComposeError::io(std::env::temp_dir(), e))?;

        let mut composition = Self {
            name: name.to_string(),
            path,
            description: manifest.description,
            config,
            policy,
            spec,
            dependencies,
            workflows: manifest.workflows,
            test_results: Vec::new(),
            running_tests: BTreeSet::new(),
            resolver,
            runtime: repo.runtime(),
            file,
        };
        composition.write_spec()?;
        tracing::info!(
            composition = %composition.name,
            services = composition.spec.services.len(),
            workflows = composition.workflows.len(),
            "loaded composition"
        );
        Ok(composition)
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Composition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composition directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Description from the manifest.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Registered workflows.
    #[must_use]
    pub const fn workflows(&self) -> &WorkflowTable {
        &self.workflows
    }

    /// The live specification.
    #[must_use]
    pub const fn spec(&self) -> &Specification {
        &self.spec
    }

    /// Resolved build dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// Path of the rendered specification handed to the runtime.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        self.file.path()
    }

    /// The rendered form of the live specification.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn rendered(&self) -> Result<String> {
        self.spec.render()
    }

    /// Makes every build dependency available to the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Acquisition`] if an image cannot be acquired.
    pub fn acquire(&self) -> Result<()> {
        self.dependencies.acquire()
    }

    /// Rewrites the rendered specification in place, so the runtime always
    /// reads the live value.
    fn write_spec(&mut self) -> Result<()> {
        let rendered = self.spec.render()?;
        let path = self.file.path().to_path_buf();
        overwrite(self.file.as_file_mut(), rendered.as_bytes()).map_err(|e| ComposeError::io(path, e))
    }

    fn service_config(&self, service: &str) -> Result<&ServiceConfig> {
        self.spec
            .service(service)
            .ok_or_else(|| ComposeError::UnknownService {
                name: service.to_string(),
            })
    }

    // ── Invocation ──────────────────────────────────────────────

    /// Checks that the container runtime is installed before any command is
    /// issued against it.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeUnavailable`] if it is not.
    pub fn ensure_runtime(&self) -> Result<()> {
        if self.runtime.is_available() {
            Ok(())
        } else {
            tracing::error!(program = %self.config.docker_binary, "container runtime not found");
            Err(ComposeError::RuntimeUnavailable {
                program: self.config.docker_binary.clone(),
            })
        }
    }

    /// Runs one runtime command against the rendered specification.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] on a non-zero exit
    /// when the invocation is checked, or any error spawning the runtime.
    pub fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutput> {
        if self.config.silent {
            tracing::debug!(composition = %self.name, "$ {invocation}");
        } else {
            tracing::info!(composition = %self.name, "$ {invocation}");
        }

        let project = Project {
            file: self.file.path(),
            directory: &self.path,
            name: self.config.project_name.as_deref(),
        };
        let output = self.runtime.invoke(&project, invocation)?;

        if invocation.check && !output.is_success() {
            if !output.stdout.is_empty() {
                tracing::error!(stdout = %output.stdout, "captured output of failed command");
            }
            let command = match invocation.subcommand() {
                Some(sub) if invocation.program == Program::Compose => {
                    format!("docker compose {sub}")
                }
                Some(sub) => format!("docker {sub}"),
                None => "docker".to_string(),
            };
            return Err(ComposeError::RuntimeInvocationFailed {
                command,
                exit_code: output.exit_code,
            });
        }
        Ok(output)
    }

    fn compose<I, S>(&self, args: I) -> Result<InvocationOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoke(&Invocation::compose(args))
    }

    // ── Ports ───────────────────────────────────────────────────

    /// Returns the host port mapped to `private_port` of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::PortNotExposed`] if the runtime reports no
    /// mapping, e.g. because the service is not running.
    pub fn port(&self, service: &str, private_port: impl fmt::Display) -> Result<u16> {
        let private_port = private_port.to_string();
        let output = self.invoke(
            &Invocation::compose(["port", service, private_port.as_str()])
                .capture_stdout(true)
                .check(false),
        )?;
        let not_exposed = || ComposeError::PortNotExposed {
            service: service.to_string(),
            port: private_port.clone(),
        };
        if !output.is_success() {
            return Err(not_exposed());
        }
        let mapping = output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(not_exposed)?;
        mapping
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| ComposeError::Config {
                message: format!("unparseable port mapping {mapping:?} for service {service:?}"),
            })
    }

    /// Returns the host port mapped to the first port `service` declares.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::NoPortsDeclared`] if the service declares no
    /// ports, or any error from [`port`](Self::port).
    pub fn default_port(&self, service: &str) -> Result<u16> {
        let first = self
            .service_config(service)?
            .port_list()
            .first()
            .ok_or_else(|| ComposeError::NoPortsDeclared {
                service: service.to_string(),
            })?;
        self.port(service, first.private_port())
    }

    /// Waits until the host port mapped to `private_port` accepts TCP
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns a port lookup error, or [`ComposeError::ReadinessTimeout`].
    pub fn wait_for_service_port(
        &self,
        service: &str,
        private_port: impl fmt::Display,
        timeout: Duration,
    ) -> Result<u16> {
        let port = self.port(service, private_port)?;
        poll::wait_for_tcp("localhost", port, timeout)?;
        Ok(port)
    }

    // ── Workflows ───────────────────────────────────────────────

    /// Runs the workflow `name` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownWorkflow`] for unknown names,
    /// [`ComposeError::UnrecognizedArgument`] for stray arguments to a plain
    /// workflow, or whatever the workflow body returns.
    pub fn workflow(&mut self, name: &str, args: &[String]) -> Result<WorkflowOutcome> {
        let workflow = self
            .workflows
            .get(name)
            .cloned()
            .ok_or_else(|| ComposeError::UnknownWorkflow {
                name: name.to_string(),
            })?;
        tracing::info!(composition = %self.name, workflow = %name, "running workflow");
        let parser = WorkflowArgumentParser::new(name, workflow.doc(), args.to_vec());

        let result = match workflow {
            Workflow::Plain { run, .. } => match parser.parse() {
                Ok(_) => run(self),
                Err(e) => Err(e),
            },
            Workflow::WithArgs { run, .. } => run(self, parser),
        };
        match result {
            Ok(()) => Ok(WorkflowOutcome::Completed),
            Err(ComposeError::HelpRequested { usage }) => Ok(WorkflowOutcome::HelpShown(usage)),
            Err(e) => Err(e),
        }
    }

    // ── Scoped mutation ─────────────────────────────────────────

    /// Runs `body`, then reinstates the specification that was live before
    /// it, whatever the outcome. A panic in `body` resumes after restoration.
    fn scoped<R>(&mut self, body: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let snapshot = self.spec.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        self.spec = snapshot;
        let restored = self.write_spec();
        match outcome {
            Ok(Ok(value)) => restored.map(|()| value),
            Ok(Err(e)) => {
                if let Err(restore_err) = restored {
                    tracing::error!(error = %restore_err, "failed to restore specification");
                }
                Err(e)
            }
            Err(payload) => {
                if let Err(restore_err) = restored {
                    tracing::error!(error = %restore_err, "failed to restore specification");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Temporarily replaces existing services for the duration of `body`.
    ///
    /// Replacements are munged like the originals and swapped in whole; they
    /// are never merged with the definitions they replace, and no new service
    /// can be introduced. Dependencies of the replacements are acquired and
    /// variable image tags are pulled before `body` runs. The prior
    /// specification is restored whether `body` succeeds, fails, or panics.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownService`] if a replacement names a
    /// service not in the composition, any error installing the
    /// replacements, or the error returned by `body`.
    pub fn with_override<R>(
        &mut self,
        services: Vec<Service>,
        body: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if let Some(unknown) = services.iter().find(|s| !self.spec.contains(&s.name)) {
            return Err(ComposeError::UnknownService {
                name: unknown.name.clone(),
            });
        }
        self.scoped(|c| {
            c.install_override(&services)?;
            body(c)
        })
    }

    fn install_override(&mut self, services: &[Service]) -> Result<()> {
        let munged = munge(services, &self.policy, self.resolver.as_ref())?;
        let names: Vec<String> = munged.services.iter().map(|s| s.name.clone()).collect();
        for service in munged.services {
            tracing::debug!(composition = %self.name, service = %service.name, "overriding service");
            let _ = self.spec.replace_service(service)?;
        }
        munged.dependencies.acquire()?;
        self.write_spec()?;
        self.pull_if_variable(&names)
    }

    // ── Test cases ──────────────────────────────────────────────

    /// Runs `body` as the test case `name` and records its outcome.
    ///
    /// An error or panic inside `body` is recorded as the test case's failure
    /// and does not propagate.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateTestCase`] if `name` was already used
    /// by this composition; the earlier result is left untouched.
    pub fn test_case(&mut self, name: &str, body: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if self.running_tests.contains(name) || self.test_results.iter().any(|(n, _)| n == name) {
            return Err(ComposeError::DuplicateTestCase {
                name: name.to_string(),
            });
        }
        let _ = self.running_tests.insert(name.to_string());
        tracing::info!(composition = %self.name, test_case = %name, "running test case");

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *self)));
        let duration = start.elapsed();
        let error = match outcome {
            Ok(Ok(())) => {
                tracing::info!(test_case = %name, "test case succeeded");
                None
            }
            Ok(Err(e)) => {
                tracing::error!(test_case = %name, error = %e, "test case failed");
                Some(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(test_case = %name, panic = %message, "test case panicked");
                Some(ComposeError::Panicked { message }.to_string())
            }
        };

        let _ = self.running_tests.remove(name);
        self.test_results
            .push((name.to_string(), TestResult { duration, error }));
        Ok(())
    }

    /// Results of every test case, in execution order.
    pub fn test_results(&self) -> impl Iterator<Item = (&str, &TestResult)> {
        self.test_results.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Names of the test cases that failed, in execution order.
    #[must_use]
    pub fn failed_test_cases(&self) -> Vec<&str> {
        self.test_results()
            .filter(|(_, r)| !r.passed())
            .map(|(n, _)| n)
            .collect()
    }

    /// Summarizes the recorded test cases.
    #[must_use]
    pub fn summary(&self) -> TestSummary {
        let cases: Vec<TestCaseReport> = self
            .test_results()
            .map(|(name, r)| TestCaseReport {
                name: name.to_string(),
                duration_secs: r.duration.as_secs_f64(),
                error: r.error.clone(),
            })
            .collect();
        let failed = cases.iter().filter(|c| c.error.is_some()).count();
        TestSummary {
            composition: self.name.clone(),
            passed: cases.len() - failed,
            failed,
            cases,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Builds, (re)creates, and starts `services`, or every service if empty.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn up(&mut self, services: &[&str], options: UpOptions) -> Result<()> {
        let mut args = vec!["up".to_string()];
        if options.detach {
            args.push("--detach".into());
        }
        if options.wait {
            args.push("--wait".into());
        }
        args.extend(services.iter().map(|s| (*s).to_string()));

        if options.persistent {
            self.scoped(|c| {
                c.spec = c.spec.with_persistent_entrypoints();
                c.write_spec()?;
                c.compose(args).map(drop)
            })
        } else {
            self.compose(args).map(drop)
        }
    }

    /// Stops and removes the composition's containers and networks.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn down(&self, options: DownOptions) -> Result<()> {
        let mut args = vec!["down"];
        if options.destroy_volumes {
            args.push("--volumes");
        }
        if options.remove_orphans {
            args.push("--remove-orphans");
        }
        self.compose(args).map(drop)
    }

    /// Stops the containers of `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn stop(&self, services: &[&str]) -> Result<()> {
        self.compose(std::iter::once("stop").chain(services.iter().copied()))
            .map(drop)
    }

    /// Delivers `signal` (default `SIGKILL`) to the containers of `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn kill(&self, services: &[&str], signal: Option<&str>) -> Result<()> {
        let signal = format!("-s{}", signal.unwrap_or(DEFAULT_KILL_SIGNAL));
        let mut args = vec!["kill".to_string(), signal];
        args.extend(services.iter().map(|s| (*s).to_string()));
        self.compose(args).map(drop)
    }

    /// Pauses the containers of `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn pause(&self, services: &[&str]) -> Result<()> {
        self.compose(std::iter::once("pause").chain(services.iter().copied()))
            .map(drop)
    }

    /// Unpauses the containers of `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn unpause(&self, services: &[&str]) -> Result<()> {
        self.compose(std::iter::once("unpause").chain(services.iter().copied()))
            .map(drop)
    }

    /// Removes the stopped containers of `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if the runtime fails.
    pub fn rm(&self, services: &[&str], options: RmOptions) -> Result<()> {
        let mut args = vec!["rm", "--force"];
        if options.stop {
            args.push("--stop");
        }
        if options.destroy_volumes {
            args.push("-v");
        }
        args.extend(services.iter().copied());
        self.compose(args).map(drop)
    }

    /// Removes named volumes of this composition.
    ///
    /// Volume names are qualified with the composition name, so `pgdata` in
    /// composition `demo` removes `demo_pgdata`. With `force`, missing
    /// volumes are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if removal fails.
    pub fn rm_volumes(&self, volumes: &[&str], force: bool) -> Result<()> {
        let mut args = vec!["volume".to_string(), "rm".to_string()];
        if force {
            args.push("--force".into());
        }
        args.extend(volumes.iter().map(|v| format!("{}_{v}", self.name)));
        self.invoke(&Invocation::docker(args)).map(drop)
    }

    /// Runs a one-off command in a new container for `service`.
    ///
    /// Any service whose definition changed is recreated first, by an `up`
    /// that requests zero instances of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if either invocation
    /// fails and is checked.
    pub fn run<I, S>(&self, service: &str, args: I, options: RunOptions) -> Result<InvocationOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scale = format!("{service}=0");
        let _ = self.compose(["up", "--detach", "--scale", scale.as_str(), service])?;

        let mut argv = vec!["run".to_string()];
        if let Some(entrypoint) = &options.entrypoint {
            argv.push("--entrypoint".into());
            argv.push(entrypoint.clone());
        }
        argv.extend(options.env_extra.iter().map(|(k, v)| format!("-e{k}={v}")));
        if options.detach {
            argv.push("--detach".into());
        }
        if options.rm {
            argv.push("--rm".into());
        }
        argv.push(service.to_string());
        argv.extend(args.into_iter().map(Into::into));

        self.invoke(
            &Invocation::compose(argv)
                .capture_stdout(options.capture_stdout)
                .capture_stderr(options.capture_stderr)
                .stdin(options.stdin)
                .check(options.check),
        )
    }

    /// Runs a command in the running container of `service`, under the
    /// service's configured entrypoint.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownService`] if the service does not
    /// exist, or [`ComposeError::RuntimeInvocationFailed`] if the command
    /// fails and is checked.
    pub fn exec<I, S>(&self, service: &str, args: I, options: ExecOptions) -> Result<InvocationOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entrypoint = self
            .service_config(service)?
            .entrypoint
            .clone()
            .unwrap_or_default();

        let mut argv = vec!["exec".to_string()];
        if options.detach {
            argv.push("--detach".into());
        }
        argv.push("-T".into());
        argv.push(service.to_string());
        argv.extend(entrypoint);
        argv.extend(args.into_iter().map(Into::into));

        self.invoke(
            &Invocation::compose(argv)
                .capture_stdout(options.capture_stdout)
                .capture_stderr(options.capture_stderr)
                .stdin(options.stdin)
                .check(options.check),
        )
    }

    /// Pulls the images of `services` whose tags may move over time.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::RuntimeInvocationFailed`] if a pull fails.
    pub fn pull_if_variable(&self, services: &[String]) -> Result<()> {
        for service in services {
            if self.service_config(service)?.has_variable_image() {
                let _ = self.compose(["pull", service.as_str()])?;
            }
        }
        Ok(())
    }

    /// Sleeps for `duration`.
    pub fn sleep(&self, duration: Duration) {
        tracing::info!(composition = %self.name, ?duration, "sleeping");
        std::thread::sleep(duration);
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("services", &self.spec.services.keys().collect::<Vec<_>>())
            .field("workflows", &self.workflows.len())
            .field("file", &self.file.path())
            .finish_non_exhaustive()
    }
}

fn overwrite(file: &mut std::fs::File, contents: &[u8]) -> std::io::Result<()> {
    file.set_len(0)?;
    file.rewind()?;
    file.write_all(contents)?;
    file.flush()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }

    #[test]
    fn summary_serializes_counts() {
        let summary = TestSummary {
            composition: "demo".into(),
            passed: 1,
            failed: 1,
            cases: vec![
                TestCaseReport {
                    name: "short".into(),
                    duration_secs: 0.5,
                    error: None,
                },
                TestCaseReport {
                    name: "long".into(),
                    duration_secs: 1.0,
                    error: Some("running docker compose run failed".into()),
                },
            ],
        };
        let json: serde_json::Value =
            serde_json::from_str(&summary.to_json().expect("json")).expect("parse");
        assert_eq!(json["failed"], 1);
        assert_eq!(json["cases"][1]["name"], "long");
        assert!(json["cases"][0]["error"].is_null());
    }

    #[test]
    fn default_options_match_runtime_defaults() {
        let up = UpOptions::default();
        assert!(up.detach && up.wait && !up.persistent);
        let down = DownOptions::default();
        assert!(down.destroy_volumes && down.remove_orphans);
        assert!(RunOptions::default().check);
        assert!(ExecOptions::default().check);
    }
}
