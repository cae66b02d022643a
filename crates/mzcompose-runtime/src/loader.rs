//! Manifests: the services, workflows, and description of one composition.
//!
//! A [`ManifestLoader`] produces a [`Manifest`] for a composition given an
//! explicit [`LoadContext`]. Two loaders ship with the crate:
//! [`YamlManifestLoader`] reads `mzcompose.yml` from the composition
//! directory, and [`StaticManifestLoader`] serves manifests defined in Rust
//! by an embedding program. [`ChainLoader`] tries several in turn.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use mzcompose_common::config::EngineConfig;
use mzcompose_common::error::{ComposeError, Result};
use mzcompose_compose::{Service, ServiceConfig};
use serde::Deserialize;

use crate::workflow::{Workflow, WorkflowTable};

/// Everything a loader may consult.
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    /// Composition name.
    pub name: &'a str,
    /// Composition directory.
    pub path: &'a Path,
    /// Engine configuration.
    pub config: &'a EngineConfig,
}

/// The definitions of one composition.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Free-form description shown by `describe`.
    pub description: Option<String>,
    /// Services, in declaration order.
    pub services: Vec<Service>,
    /// Workflows by dispatch name.
    pub workflows: WorkflowTable,
}

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a service.
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>, config: ServiceConfig) -> Self {
        self.services.push(Service::new(name, config));
        self
    }

    /// Registers a workflow under a dispatch name.
    #[must_use]
    pub fn with_workflow(mut self, name: impl Into<String>, workflow: Workflow) -> Self {
        self.workflows.insert(name, workflow);
        self
    }

    /// Checks that no service is declared twice.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateService`] naming the first repeat.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ComposeError::DuplicateService {
                    name: service.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Produces the manifest of a composition.
pub trait ManifestLoader: Send + Sync {
    /// Loads the manifest for `ctx`, or `None` if the composition has no
    /// definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition exists but cannot be read.
    fn load(&self, ctx: &LoadContext<'_>) -> Result<Option<Manifest>>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    name: String,
    #[serde(flatten)]
    config: ServiceConfig,
}

/// Reads the configured manifest file from the composition directory.
///
/// ```yaml
/// description: Kafka ingestion tests.
/// services:
///   - name: zookeeper
///     image: confluentinc/cp-zookeeper:7.0.5
///   - name: materialized
///     mzbuild: materialized
///     ports: [6875]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlManifestLoader;

impl YamlManifestLoader {
    /// Parses manifest text.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Yaml`] for malformed input and
    /// [`ComposeError::DuplicateService`] for repeated service names.
    pub fn parse(text: &str) -> Result<Manifest> {
        let file: ManifestFile = serde_yaml::from_str(text)?;
        let manifest = Manifest {
            description: file.description,
            services: file
                .services
                .into_iter()
                .map(|entry| Service::new(entry.name, entry.config))
                .collect(),
            workflows: WorkflowTable::new(),
        };
        manifest.validate()?;
        Ok(manifest)
    }
}

impl ManifestLoader for YamlManifestLoader {
    fn load(&self, ctx: &LoadContext<'_>) -> Result<Option<Manifest>> {
        let path = ctx.path.join(&ctx.config.manifest_file);
        if !path.is_file() {
            tracing::debug!(composition = %ctx.name, path = %path.display(), "no manifest file");
            return Ok(None);
        }
        tracing::debug!(composition = %ctx.name, path = %path.display(), "loading manifest");
        let text = std::fs::read_to_string(&path).map_err(|e| ComposeError::io(&path, e))?;
        Self::parse(&text).map(Some)
    }
}

type ManifestFactory = Box<dyn Fn(&LoadContext<'_>) -> Result<Manifest> + Send + Sync>;

/// Serves manifests built in Rust, keyed by composition name.
#[derive(Default)]
pub struct StaticManifestLoader {
    factories: BTreeMap<String, ManifestFactory>,
}

impl StaticManifestLoader {
    /// Creates a loader with no compositions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the manifest factory for a composition.
    #[must_use]
    pub fn with<F>(mut self, composition: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&LoadContext<'_>) -> Result<Manifest> + Send + Sync + 'static,
    {
        let _ = self.factories.insert(composition.into(), Box::new(factory));
        self
    }

    /// Names of the compositions this loader knows.
    pub fn compositions(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for StaticManifestLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticManifestLoader")
            .field("compositions", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ManifestLoader for StaticManifestLoader {
    fn load(&self, ctx: &LoadContext<'_>) -> Result<Option<Manifest>> {
        match self.factories.get(ctx.name) {
            Some(factory) => {
                let manifest = factory(ctx)?;
                manifest.validate()?;
                Ok(Some(manifest))
            }
            None => Ok(None),
        }
    }
}

/// Tries each loader in order; the first manifest found wins.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn ManifestLoader>>,
}

impl ChainLoader {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a loader.
    #[must_use]
    pub fn then(mut self, loader: impl ManifestLoader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl fmt::Debug for ChainLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLoader")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

impl ManifestLoader for ChainLoader {
    fn load(&self, ctx: &LoadContext<'_>) -> Result<Option<Manifest>> {
        for loader in &self.loaders {
            if let Some(manifest) = loader.load(ctx)? {
                return Ok(Some(manifest));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use mzcompose_compose::Port;

    use super::*;

    fn ctx<'a>(name: &'a str, path: &'a Path, config: &'a EngineConfig) -> LoadContext<'a> {
        LoadContext { name, path, config }
    }

    #[test]
    fn yaml_manifest_keeps_declaration_order() {
        let manifest = YamlManifestLoader::parse(
            "description: Kafka tests.\n\
             services:\n\
             \x20 - name: zookeeper\n\
             \x20   image: confluentinc/cp-zookeeper:7.0.5\n\
             \x20 - name: materialized\n\
             \x20   mzbuild: materialized\n\
             \x20   ports: [6875]\n",
        )
        .expect("parse");
        assert_eq!(manifest.description.as_deref(), Some("Kafka tests."));
        let names: Vec<&str> = manifest.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zookeeper", "materialized"]);
        assert_eq!(
            manifest.services[1].config.port_list(),
            &[Port::Number(6875)]
        );
    }

    #[test]
    fn yaml_manifest_rejects_duplicate_services() {
        let err = YamlManifestLoader::parse(
            "services:\n  - name: kafka\n    image: a\n  - name: kafka\n    image: b\n",
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateService { name } if name == "kafka"));
    }

    #[test]
    fn missing_manifest_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EngineConfig::default();
        let loaded = YamlManifestLoader
            .load(&ctx("demo", dir.path(), &config))
            .expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn manifest_file_name_comes_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("custom.yml"),
            "services:\n  - name: postgres\n    image: postgres:14\n",
        )
        .expect("write");
        let config = EngineConfig {
            manifest_file: "custom.yml".into(),
            ..EngineConfig::default()
        };
        let manifest = YamlManifestLoader
            .load(&ctx("demo", dir.path(), &config))
            .expect("load")
            .expect("some");
        assert_eq!(manifest.services.len(), 1);
    }

    #[test]
    fn chain_prefers_earlier_loaders() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("mzcompose.yml"),
            "description: from yaml\n",
        )
        .expect("write");
        let config = EngineConfig::default();
        let chain = ChainLoader::new()
            .then(StaticManifestLoader::new().with("rust", |_| {
                Ok(Manifest::new().with_description("from rust"))
            }))
            .then(YamlManifestLoader);

        let rust = chain
            .load(&ctx("rust", dir.path(), &config))
            .expect("load")
            .expect("some");
        assert_eq!(rust.description.as_deref(), Some("from rust"));

        let yaml = chain
            .load(&ctx("other", dir.path(), &config))
            .expect("load")
            .expect("some");
        assert_eq!(yaml.description.as_deref(), Some("from yaml"));
    }

    #[test]
    fn static_loader_sees_the_context() {
        let loader = StaticManifestLoader::new().with("demo", |ctx| {
            Ok(Manifest::new().with_description(format!("{} at {}", ctx.name, ctx.path.display())))
        });
        let config = EngineConfig::default();
        let manifest = loader
            .load(&ctx("demo", Path::new("/src/demo"), &config))
            .expect("load")
            .expect("some");
        assert_eq!(manifest.description.as_deref(), Some("demo at /src/demo"));
    }
}
