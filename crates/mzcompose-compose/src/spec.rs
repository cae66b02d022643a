//! The live compose specification.
//!
//! A [`Specification`] is the full document handed to the runtime: a version
//! tag, the munged service map, and the default named volumes. Services are
//! only ever swapped in whole; there is no field-level merge.

use std::collections::BTreeMap;

use mzcompose_common::constants::{COMPOSE_VERSION, DEFAULT_VOLUMES, PERSISTENT_ENTRYPOINT};
use mzcompose_common::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};

use crate::service::{Service, ServiceConfig};

/// A complete compose document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Compose file format version.
    pub version: String,
    /// Service name to munged configuration.
    pub services: BTreeMap<String, ServiceConfig>,
    /// Named volume declarations. Values are always empty.
    pub volumes: BTreeMap<String, Option<serde_yaml::Value>>,
}

impl Default for Specification {
    fn default() -> Self {
        Self::new()
    }
}

impl Specification {
    /// Creates a specification with no services and the default volumes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: COMPOSE_VERSION.to_string(),
            services: BTreeMap::new(),
            volumes: DEFAULT_VOLUMES
                .iter()
                .map(|v| ((*v).to_string(), None))
                .collect(),
        }
    }

    /// Creates a specification holding `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateService`] if two services share a name.
    pub fn from_services(services: impl IntoIterator<Item = Service>) -> Result<Self> {
        let mut spec = Self::new();
        for service in services {
            spec.insert_service(service)?;
        }
        Ok(spec)
    }

    /// Adds a service that is not yet present.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateService`] if the name is taken.
    pub fn insert_service(&mut self, service: Service) -> Result<()> {
        if self.services.contains_key(&service.name) {
            return Err(ComposeError::DuplicateService { name: service.name });
        }
        let _ = self.services.insert(service.name, service.config);
        Ok(())
    }

    /// Swaps in a new configuration for an existing service, returning the old one.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownService`] if no service has that name.
    pub fn replace_service(&mut self, service: Service) -> Result<ServiceConfig> {
        match self.services.get_mut(&service.name) {
            Some(slot) => Ok(std::mem::replace(slot, service.config)),
            None => Err(ComposeError::UnknownService { name: service.name }),
        }
    }

    /// Looks up a service's configuration.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    /// Returns whether a service with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Names of every service, sorted.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Returns a copy in which every service idles instead of running its
    /// entrypoint, so that later `exec` calls find a live container.
    #[must_use]
    pub fn with_persistent_entrypoints(&self) -> Self {
        let mut spec = self.clone();
        for config in spec.services.values_mut() {
            *config = ServiceConfig {
                entrypoint: Some(PERSISTENT_ENTRYPOINT.iter().map(|s| (*s).to_string()).collect()),
                command: Some(Vec::new()),
                ..config.clone()
            };
        }
        spec
    }

    /// Serializes the document in compose file format.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Yaml`] if serialization fails.
    pub fn render(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Specification {
        Specification::from_services([
            Service::new("postgres", ServiceConfig::from_image("postgres:14")),
            Service::new(
                "materialized",
                ServiceConfig::from_image("materialize/materialized:mzbuild-abc")
                    .with_command(["--workers", "1"]),
            ),
        ])
        .expect("spec")
    }

    #[test]
    fn new_has_default_volumes_and_version() {
        let spec = Specification::new();
        assert_eq!(spec.version, "3.7");
        let volumes: Vec<&str> = spec.volumes.keys().map(String::as_str).collect();
        assert_eq!(volumes, vec!["mydata", "mzdata", "pgdata", "secrets", "tmp"]);
    }

    #[test]
    fn render_produces_compose_document() {
        let rendered = sample().render().expect("render");
        assert!(rendered.starts_with("version:"), "got: {rendered}");
        assert!(rendered.lines().next().is_some_and(|l| l.contains("3.7")));
        assert!(rendered.contains("services:"));
        assert!(rendered.contains("  postgres:\n    image: postgres:14"));
        assert!(rendered.contains("  pgdata: null"));
    }

    #[test]
    fn render_round_trips() {
        let spec = sample();
        let parsed: Specification =
            serde_yaml::from_str(&spec.render().expect("render")).expect("parse");
        assert_eq!(parsed, spec);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut spec = sample();
        let err = spec
            .insert_service(Service::new("postgres", ServiceConfig::default()))
            .unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateService { name } if name == "postgres"));
    }

    #[test]
    fn replace_swaps_whole_value() {
        let mut spec = sample();
        let old = spec
            .replace_service(Service::new(
                "materialized",
                ServiceConfig::from_image("materialize/materialized:v0.26.0"),
            ))
            .expect("replace");
        assert_eq!(old.command, Some(vec!["--workers".into(), "1".into()]));
        let new = spec.service("materialized").expect("present");
        assert_eq!(new.command, None);
        assert_eq!(new.image.as_deref(), Some("materialize/materialized:v0.26.0"));
    }

    #[test]
    fn replace_unknown_service_fails() {
        let mut spec = sample();
        let err = spec
            .replace_service(Service::new("ghost", ServiceConfig::default()))
            .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownService { .. }));
        assert!(!spec.contains("ghost"));
    }

    #[test]
    fn persistent_entrypoints_leave_original_untouched() {
        let spec = sample();
        let persistent = spec.with_persistent_entrypoints();
        for config in persistent.services.values() {
            assert_eq!(
                config.entrypoint,
                Some(vec!["sleep".to_string(), "infinity".to_string()])
            );
            assert_eq!(config.command, Some(Vec::new()));
        }
        assert_eq!(spec, sample());
    }
}
