//! Typed service definitions.
//!
//! A [`ServiceConfig`] corresponds directly to one entry under `services:` in
//! a compose file, plus three mzcompose extension keys (`mzbuild`,
//! `propagate_uid_gid`, `allow_host_ports`) that the munger consumes and
//! strips before the specification reaches the runtime.
//!
//! Configs are values: updating a service means building a new
//! `ServiceConfig` and swapping it into the specification wholesale.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One port entry, either a bare container port or a compose port string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Port {
    /// Container port published on an ephemeral host port, e.g. `5432`.
    Number(u16),
    /// Compose short syntax, e.g. `"6875"` or `"127.0.0.1:5432:5432"`.
    Spec(String),
}

impl Port {
    /// Returns whether this entry pins an explicit host binding.
    #[must_use]
    pub fn has_host_binding(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Spec(s) => s.contains(':'),
        }
    }

    /// Returns the container-side port, i.e. the last `:`-separated segment.
    #[must_use]
    pub fn private_port(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Spec(s) => s.rsplit(':').next().unwrap_or(s).to_string(),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Spec(s) => f.write_str(s),
        }
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Self::Number(port)
    }
}

impl From<&str> for Port {
    fn from(port: &str) -> Self {
        Self::Spec(port.to_string())
    }
}

impl From<String> for Port {
    fn from(port: String) -> Self {
        Self::Spec(port)
    }
}

/// Condition under which a dependency is considered satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDependency {
    /// e.g. `service_started`, `service_healthy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// The services this service must start after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    /// Plain list of service names.
    List(Vec<String>),
    /// Service names with per-dependency readiness conditions.
    Conditions(BTreeMap<String, ServiceDependency>),
}

impl DependsOn {
    /// Names of the services depended upon.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::List(names) => names.iter().map(String::as_str).collect(),
            Self::Conditions(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// A healthcheck test command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthcheckTest {
    /// Shell string.
    Shell(String),
    /// Exec form, e.g. `["CMD", "pg_isready"]`.
    Exec(Vec<String>),
}

/// Configuration for a check that determines whether a service is healthy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealthcheck {
    /// Command to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<HealthcheckTest>,
    /// Interval between checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Maximum time a single check may take.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Consecutive failures before the container is unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Grace period after start during which failures are not counted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
}

/// The definition of one service.
///
/// Unrecognized keys are carried through to the rendered specification
/// untouched in [`ServiceConfig::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Name of an mzbuild image to acquire and substitute for `image`.
    /// Mutually exclusive with `image`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mzbuild: Option<String>,
    /// Run the container as the host user's uid:gid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate_uid_gid: Option<bool>,
    /// Permit fixed host port bindings in `ports`.
    ///
    /// Compositions that publish the same host port cannot run concurrently,
    /// so this is meant only for background developer services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_host_ports: Option<bool>,

    /// Image name and tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Hostname; defaults to the service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Additional hostname mappings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<String>>,
    /// Overrides the image entrypoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    /// Overrides the image command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Run an init process in the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
    /// Ports to expose to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<Port>>,
    /// `NAME=VALUE` environment entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<String>>,
    /// Services that must start first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
    /// Paths at which to mount temporary file systems.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmpfs: Option<Vec<String>>,
    /// Volumes to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,
    /// Additional networks to join, with per-network options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<BTreeMap<String, BTreeMap<String, Vec<String>>>>,
    /// Deployment configuration such as resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>>,
    /// Overrides the default ulimits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ulimits: Option<BTreeMap<String, serde_yaml::Value>>,
    /// Overrides the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Health check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<ServiceHealthcheck>,
    /// Restart policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
    /// `uid:gid` to run as. Set by the munger for `propagate_uid_gid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Keys outside the recognized surface, passed through verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceConfig {
    /// A service running a registry image.
    #[must_use]
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// A service running an mzbuild image.
    #[must_use]
    pub fn from_mzbuild(name: impl Into<String>) -> Self {
        Self {
            mzbuild: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the port list.
    #[must_use]
    pub fn with_ports<P: Into<Port>>(mut self, ports: impl IntoIterator<Item = P>) -> Self {
        self.ports = Some(ports.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the environment entries.
    #[must_use]
    pub fn with_environment<S: Into<String>>(mut self, env: impl IntoIterator<Item = S>) -> Self {
        self.environment = Some(env.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the volume list.
    #[must_use]
    pub fn with_volumes<S: Into<String>>(mut self, volumes: impl IntoIterator<Item = S>) -> Self {
        self.volumes = Some(volumes.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the entrypoint.
    #[must_use]
    pub fn with_entrypoint<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.entrypoint = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the command.
    #[must_use]
    pub fn with_command<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.command = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the dependency list.
    #[must_use]
    pub fn with_depends_on(mut self, depends_on: DependsOn) -> Self {
        self.depends_on = Some(depends_on);
        self
    }

    /// Sets the healthcheck.
    #[must_use]
    pub fn with_healthcheck(mut self, healthcheck: ServiceHealthcheck) -> Self {
        self.healthcheck = Some(healthcheck);
        self
    }

    /// Sets the restart policy.
    #[must_use]
    pub fn with_restart(mut self, restart: impl Into<String>) -> Self {
        self.restart = Some(restart.into());
        self
    }

    /// Opts in to fixed host port bindings.
    #[must_use]
    pub const fn allow_host_ports(mut self, allow: bool) -> Self {
        self.allow_host_ports = Some(allow);
        self
    }

    /// Requests running as the host user.
    #[must_use]
    pub const fn propagate_uid_gid(mut self, propagate: bool) -> Self {
        self.propagate_uid_gid = Some(propagate);
        self
    }

    /// Returns the declared ports, or an empty slice.
    #[must_use]
    pub fn port_list(&self) -> &[Port] {
        self.ports.as_deref().unwrap_or(&[])
    }

    /// Returns whether the image tag suggests the image may change over time.
    #[must_use]
    pub fn has_variable_image(&self) -> bool {
        self.image.as_deref().is_some_and(|image| {
            mzcompose_common::constants::VARIABLE_IMAGE_TAGS
                .iter()
                .any(|tag| image.ends_with(tag))
        })
    }
}

/// A named service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// Unique name within a composition.
    pub name: String,
    /// Service definition.
    pub config: ServiceConfig,
}

impl Service {
    /// Creates a service.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ServiceConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}
