//! Normalization of raw service definitions.
//!
//! Munging turns the services a composition declares into the services the
//! runtime executes:
//!
//! 1. `mzbuild` references are validated against the build resolver.
//! 2. `propagate_uid_gid` becomes a `user` directive for the host user.
//! 3. Ports are checked against the host-port policy, or rewritten to fixed
//!    bindings when ports are preserved.
//! 4. Coverage mode adds the coverage bind mount and profile variable.
//! 5. All build references are resolved in one batch and replaced by
//!    concrete image references.
//!
//! The input is never modified. A failure anywhere aborts the whole pass and
//! nothing is returned.

use mzcompose_build::{BuildResolver, DependencySet};
use mzcompose_common::config::EngineConfig;
use mzcompose_common::constants::{COVERAGE_ENV_VAR, COVERAGE_VOLUME, coverage_profile_file};
use mzcompose_common::error::{ComposeError, Result};
use mzcompose_common::types::HostUser;

use crate::service::{Port, Service, ServiceConfig};

/// Global switches that affect munging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MungePolicy {
    /// Bind unbound container ports to the same host port.
    pub preserve_ports: bool,
    /// Inject coverage instrumentation.
    pub coverage: bool,
    /// Identity used for `propagate_uid_gid`.
    pub host_user: HostUser,
}

impl MungePolicy {
    /// Derives a policy from engine configuration and the given host identity.
    #[must_use]
    pub const fn from_config(config: &EngineConfig, host_user: HostUser) -> Self {
        Self {
            preserve_ports: config.preserve_ports,
            coverage: config.coverage,
            host_user,
        }
    }
}

/// The result of a successful munge.
#[derive(Debug)]
pub struct Munged {
    /// Normalized services, in input order. No extension keys remain.
    pub services: Vec<Service>,
    /// Resolved build dependencies, not yet acquired.
    pub dependencies: DependencySet,
}

/// Normalizes `services` under `policy`, resolving build references with `resolver`.
///
/// # Errors
///
/// - [`ComposeError::Config`] if a service sets both or neither of `image`
///   and `mzbuild`.
/// - [`ComposeError::UnknownBuildTarget`] if an `mzbuild` reference is unknown.
/// - [`ComposeError::DisallowedHostPort`] if a service binds a host port
///   without `allow_host_ports`.
/// - Any error from batch resolution.
pub fn munge(
    services: &[Service],
    policy: &MungePolicy,
    resolver: &dyn BuildResolver,
) -> Result<Munged> {
    let mut munged = Vec::with_capacity(services.len());
    let mut build_refs: Vec<String> = Vec::new();

    for service in services {
        let config = munge_one(service, policy, resolver)?;
        if let Some(name) = &config.mzbuild {
            if !build_refs.contains(name) {
                build_refs.push(name.clone());
            }
        }
        munged.push(Service::new(service.name.clone(), config));
    }

    let dependencies = if build_refs.is_empty() {
        DependencySet::empty()
    } else {
        resolver.resolve(&build_refs)?
    };

    for service in &mut munged {
        if let Some(name) = service.config.mzbuild.take() {
            let spec = dependencies
                .spec(&name)
                .ok_or_else(|| ComposeError::UnknownBuildTarget { name: name.clone() })?;
            tracing::debug!(service = %service.name, mzbuild = %name, image = %spec, "substituted build reference");
            service.config.image = Some(spec.to_string());
        }
    }

    Ok(Munged {
        services: munged,
        dependencies,
    })
}

/// Applies every per-service step except build substitution.
fn munge_one(
    service: &Service,
    policy: &MungePolicy,
    resolver: &dyn BuildResolver,
) -> Result<ServiceConfig> {
    let name = service.name.as_str();
    let mut config = service.config.clone();

    match (&config.mzbuild, &config.image) {
        (Some(_), Some(_)) => {
            return Err(ComposeError::Config {
                message: format!("service {name:?} sets both `mzbuild` and `image`"),
            });
        }
        (None, None) if !config.extra.contains_key("build") => {
            return Err(ComposeError::Config {
                message: format!("service {name:?} sets neither `mzbuild` nor `image`"),
            });
        }
        (Some(target), None) if !resolver.contains(target) => {
            return Err(ComposeError::UnknownBuildTarget {
                name: target.clone(),
            });
        }
        _ => {}
    }

    if config.propagate_uid_gid.take() == Some(true) {
        config.user = Some(policy.host_user.user_directive());
    }

    let allow_host_ports = config.allow_host_ports.take().unwrap_or(false);
    if let Some(ports) = config.ports.take() {
        config.ports = Some(apply_port_policy(
            name,
            ports,
            policy.preserve_ports,
            allow_host_ports,
        )?);
    }

    if policy.coverage {
        inject_coverage(name, &mut config);
    }

    Ok(config)
}

fn apply_port_policy(
    service: &str,
    ports: Vec<Port>,
    preserve_ports: bool,
    allow_host_ports: bool,
) -> Result<Vec<Port>> {
    ports
        .into_iter()
        .map(|port| {
            if preserve_ports && !port.has_host_binding() {
                Ok(Port::Spec(format!("{port}:{port}")))
            } else if port.has_host_binding() && !allow_host_ports {
                Err(ComposeError::DisallowedHostPort {
                    service: service.to_string(),
                    port: port.to_string(),
                })
            } else {
                Ok(port)
            }
        })
        .collect()
}

/// Adds the coverage mount and exactly one coverage profile variable.
///
/// Running this on an already instrumented config changes nothing.
pub fn inject_coverage(service: &str, config: &mut ServiceConfig) {
    let volumes = config.volumes.get_or_insert_with(Vec::new);
    if !volumes.iter().any(|v| v == COVERAGE_VOLUME) {
        volumes.push(COVERAGE_VOLUME.to_string());
    }

    let entry = format!("{COVERAGE_ENV_VAR}={}", coverage_profile_file(service));
    let prefix = format!("{COVERAGE_ENV_VAR}=");
    let environment = config.environment.get_or_insert_with(Vec::new);
    match environment.iter().position(|e| e.starts_with(&prefix)) {
        Some(first) => {
            environment[first] = entry;
            let mut index = 0;
            environment.retain(|e| {
                let keep = index == first || !e.starts_with(&prefix);
                index += 1;
                keep
            });
        }
        None => environment.push(entry),
    }
}

#[cfg(test)]
mod tests {
    use mzcompose_build::StaticResolver;

    use super::*;

    const HOST: HostUser = HostUser::new(1000, 1001);

    fn policy() -> MungePolicy {
        MungePolicy {
            preserve_ports: false,
            coverage: false,
            host_user: HOST,
        }
    }

    fn resolver() -> StaticResolver {
        StaticResolver::new().with_image("materialized", "materialize/materialized:mzbuild-abc")
    }

    fn one(config: ServiceConfig) -> Vec<Service> {
        vec![Service::new("svc", config)]
    }

    #[test]
    fn build_reference_is_replaced_by_image() {
        let resolver = resolver();
        let out = munge(
            &one(ServiceConfig::from_mzbuild("materialized")),
            &policy(),
            &resolver,
        )
        .expect("munge");
        let config = &out.services[0].config;
        assert_eq!(config.mzbuild, None);
        assert_eq!(
            config.image.as_deref(),
            Some("materialize/materialized:mzbuild-abc")
        );
        assert_eq!(out.dependencies.len(), 1);
        assert!(resolver.acquired().is_empty(), "munge must not acquire");
    }

    #[test]
    fn unknown_build_reference_fails() {
        let err = munge(
            &one(ServiceConfig::from_mzbuild("ghost")),
            &policy(),
            &resolver(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownBuildTarget { name } if name == "ghost"));
    }

    #[test]
    fn image_and_build_reference_are_exclusive() {
        let config = ServiceConfig {
            image: Some("postgres".into()),
            ..ServiceConfig::from_mzbuild("materialized")
        };
        let err = munge(&one(config), &policy(), &resolver()).unwrap_err();
        assert!(matches!(err, ComposeError::Config { .. }), "got: {err}");
    }

    #[test]
    fn missing_image_fails() {
        let err = munge(&one(ServiceConfig::default()), &policy(), &resolver()).unwrap_err();
        assert!(matches!(err, ComposeError::Config { .. }), "got: {err}");
    }

    #[test]
    fn propagate_uid_gid_sets_user_and_is_stripped() {
        let config = ServiceConfig::from_image("ubuntu").propagate_uid_gid(true);
        let out = munge(&one(config), &policy(), &resolver()).expect("munge");
        let config = &out.services[0].config;
        assert_eq!(config.user.as_deref(), Some("1000:1001"));
        assert_eq!(config.propagate_uid_gid, None);
    }

    #[test]
    fn propagate_uid_gid_false_leaves_user_alone() {
        let config = ServiceConfig::from_image("ubuntu").propagate_uid_gid(false);
        let out = munge(&one(config), &policy(), &resolver()).expect("munge");
        assert_eq!(out.services[0].config.user, None);
        assert_eq!(out.services[0].config.propagate_uid_gid, None);
    }

    #[test]
    fn host_ports_require_opt_in() {
        let config = ServiceConfig::from_image("postgres").with_ports(["5432:5432"]);
        let err = munge(&one(config), &policy(), &resolver()).unwrap_err();
        assert!(
            matches!(&err, ComposeError::DisallowedHostPort { service, port } if service == "svc" && port == "5432:5432"),
            "got: {err}"
        );
    }

    #[test]
    fn allowed_host_ports_are_kept_verbatim() {
        let config = ServiceConfig::from_image("postgres")
            .with_ports(["5432:5432"])
            .allow_host_ports(true);
        let out = munge(&one(config), &policy(), &resolver()).expect("munge");
        let config = &out.services[0].config;
        assert_eq!(config.port_list(), &[Port::from("5432:5432")]);
        assert_eq!(config.allow_host_ports, None);
    }

    #[test]
    fn preserve_ports_binds_same_host_port() {
        let config = ServiceConfig::from_image("materialized").with_ports([6875u16, 6876]);
        let policy = MungePolicy {
            preserve_ports: true,
            ..policy()
        };
        let out = munge(&one(config), &policy, &resolver()).expect("munge");
        assert_eq!(
            out.services[0].config.port_list(),
            &[Port::from("6875:6875"), Port::from("6876:6876")]
        );
    }

    #[test]
    fn preserve_ports_still_rejects_explicit_bindings() {
        let config = ServiceConfig::from_image("materialized").with_ports(["1234:6875"]);
        let policy = MungePolicy {
            preserve_ports: true,
            ..policy()
        };
        let err = munge(&one(config), &policy, &resolver()).unwrap_err();
        assert!(matches!(err, ComposeError::DisallowedHostPort { .. }));
    }

    #[test]
    fn failed_munge_leaves_input_untouched() {
        let input = vec![
            Service::new(
                "ok",
                ServiceConfig::from_image("ubuntu").propagate_uid_gid(true),
            ),
            Service::new(
                "bad",
                ServiceConfig::from_image("postgres").with_ports(["5432:5432"]),
            ),
        ];
        let before = input.clone();
        let _ = munge(&input, &policy(), &resolver()).unwrap_err();
        assert_eq!(input, before);
    }

    #[test]
    fn coverage_adds_volume_and_profile() {
        let policy = MungePolicy {
            coverage: true,
            ..policy()
        };
        let out = munge(
            &[Service::new("materialized", ServiceConfig::from_image("mz"))],
            &policy,
            &resolver(),
        )
        .expect("munge");
        let config = &out.services[0].config;
        assert_eq!(config.volumes, Some(vec!["./coverage:/coverage".into()]));
        assert_eq!(
            config.environment,
            Some(vec![
                "LLVM_PROFILE_FILE=/coverage/materialized-%p-%9m%c.profraw".into()
            ])
        );
    }

    #[test]
    fn coverage_replaces_existing_profile_entries() {
        let mut config = ServiceConfig::from_image("mz").with_environment([
            "LLVM_PROFILE_FILE=/tmp/a",
            "RUST_LOG=debug",
            "LLVM_PROFILE_FILE=/tmp/b",
        ]);
        inject_coverage("mz", &mut config);
        assert_eq!(
            config.environment,
            Some(vec![
                "LLVM_PROFILE_FILE=/coverage/mz-%p-%9m%c.profraw".into(),
                "RUST_LOG=debug".into(),
            ])
        );
    }

    #[test]
    fn repeated_build_references_resolve_once() {
        let services = vec![
            Service::new("a", ServiceConfig::from_mzbuild("materialized")),
            Service::new("b", ServiceConfig::from_mzbuild("materialized")),
        ];
        let out = munge(&services, &policy(), &resolver()).expect("munge");
        assert_eq!(out.dependencies.len(), 1);
        assert!(out.services.iter().all(|s| s.config.image.is_some()));
    }
}
