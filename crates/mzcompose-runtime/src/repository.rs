//! The compositions of a source tree, and everything needed to load them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mzcompose_build::repository::ImageRepository;
use mzcompose_build::{BuildResolver, StaticResolver};
use mzcompose_common::config::EngineConfig;
use mzcompose_common::error::{ComposeError, Result};
use mzcompose_common::types::HostUser;

use crate::backend::ComposeRuntime;
use crate::backend::docker::DockerCli;
use crate::loader::{ManifestLoader, YamlManifestLoader};

/// Directory names never searched for compositions.
const IGNORED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

/// A registry of compositions plus the collaborators they are loaded with.
pub struct Repository {
    root: PathBuf,
    compositions: BTreeMap<String, PathBuf>,
    config: EngineConfig,
    host_user: HostUser,
    resolver: Arc<dyn BuildResolver>,
    runtime: Arc<dyn ComposeRuntime>,
    loader: Arc<dyn ManifestLoader>,
}

impl Repository {
    /// Creates a repository with no compositions.
    ///
    /// Collaborators default to an empty build resolver, the docker CLI, and
    /// the YAML manifest loader.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        let runtime = DockerCli::new(config.docker_binary.clone());
        Self {
            root: root.into(),
            compositions: BTreeMap::new(),
            config,
            host_user: HostUser::current(),
            resolver: Arc::new(StaticResolver::new()),
            runtime: Arc::new(runtime),
            loader: Arc::new(YamlManifestLoader),
        }
    }

    /// Discovers the compositions and mzbuild images under `root`.
    ///
    /// Every directory containing the configured manifest file is a
    /// composition named after the directory.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateComposition`] if two directories share
    /// a name, or an error from walking the tree or discovering images.
    pub fn discover(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let root = root.into();
        let images = ImageRepository::discover(&root, &config.docker_binary, config.offline)?;
        let mut repo = Self::new(root, config).with_resolver(Arc::new(images));
        repo.scan()?;
        Ok(repo)
    }

    fn scan(&mut self) -> Result<()> {
        tracing::info!(root = %self.root.display(), "discovering compositions");
        let walker = walkdir::WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && IGNORED_DIRS
                            .iter()
                            .any(|d| e.file_name().to_string_lossy() == *d))
            });
        let mut found = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| ComposeError::Io {
                path: e.path().unwrap_or(&self.root).to_path_buf(),
                source: e.into(),
            })?;
            if entry.file_type().is_file() && entry.file_name() == self.config.manifest_file.as_str()
            {
                if let Some(dir) = entry.path().parent() {
                    found.push(dir.to_path_buf());
                }
            }
        }
        for dir in found {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.register(name, dir)?;
        }
        Ok(())
    }

    /// Registers a composition directory under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateComposition`] if the name is taken by
    /// a different directory.
    pub fn register(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Result<()> {
        let name = name.into();
        let path = path.into();
        if let Some(first) = self.compositions.get(&name) {
            if *first != path {
                return Err(ComposeError::DuplicateComposition {
                    name,
                    first: first.clone(),
                    second: path,
                });
            }
        }
        tracing::debug!(composition = %name, path = %path.display(), "found composition");
        let _ = self.compositions.insert(name, path);
        Ok(())
    }

    /// Registers a composition, builder style.
    ///
    /// # Errors
    ///
    /// See [`Repository::register`].
    pub fn with_composition(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        self.register(name, path)?;
        Ok(self)
    }

    /// Replaces the build resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn BuildResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the runtime backend.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn ComposeRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Replaces the manifest loader.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ManifestLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Replaces the host identity used for `propagate_uid_gid`.
    #[must_use]
    pub const fn with_host_user(mut self, host_user: HostUser) -> Self {
        self.host_user = host_user;
        self
    }

    /// Root of the source tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a composition directory.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownComposition`] if `name` is not registered.
    pub fn composition_path(&self, name: &str) -> Result<&Path> {
        self.compositions
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| ComposeError::UnknownComposition {
                name: name.to_string(),
            })
    }

    /// Iterates over `(name, directory)` pairs, sorted by name.
    pub fn compositions(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.compositions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Host identity.
    #[must_use]
    pub const fn host_user(&self) -> HostUser {
        self.host_user
    }

    /// Build resolver.
    #[must_use]
    pub fn resolver(&self) -> Arc<dyn BuildResolver> {
        Arc::clone(&self.resolver)
    }

    /// Runtime backend.
    #[must_use]
    pub fn runtime(&self) -> Arc<dyn ComposeRuntime> {
        Arc::clone(&self.runtime)
    }

    /// Manifest loader.
    #[must_use]
    pub fn loader(&self) -> &dyn ManifestLoader {
        self.loader.as_ref()
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("compositions", &self.compositions)
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, dir: &str, file: &str) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).expect("mkdir");
        std::fs::write(path.join(file), "").expect("write");
    }

    #[test]
    fn discovers_directories_with_manifests() {
        let root = tempfile::tempdir().expect("tempdir");
        touch(root.path(), "test/kafka", "mzcompose.yml");
        touch(root.path(), "test/postgres", "mzcompose.yml");
        touch(root.path(), "test/unrelated", "README.md");
        touch(root.path(), "target/debug/stale", "mzcompose.yml");

        let repo = Repository::discover(root.path(), EngineConfig::default()).expect("discover");
        let names: Vec<&str> = repo.compositions().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["kafka", "postgres"]);
        assert_eq!(
            repo.composition_path("kafka").expect("kafka"),
            root.path().join("test/kafka")
        );
    }

    #[test]
    fn root_named_like_an_ignored_directory_is_searched() {
        let parent = tempfile::tempdir().expect("tempdir");
        let root = parent.path().join("node_modules");
        touch(&root, "demo", "mzcompose.yml");
        touch(&root, "node_modules/nested", "mzcompose.yml");

        let repo = Repository::discover(&root, EngineConfig::default()).expect("discover");
        let names: Vec<&str> = repo.compositions().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["demo"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let root = tempfile::tempdir().expect("tempdir");
        touch(root.path(), "a/demo", "mzcompose.yml");
        touch(root.path(), "b/demo", "mzcompose.yml");
        let err = Repository::discover(root.path(), EngineConfig::default()).unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateComposition { name, .. } if name == "demo"));
    }

    #[test]
    fn unknown_composition_is_reported() {
        let repo = Repository::new("/src", EngineConfig::default());
        let err = repo.composition_path("ghost").unwrap_err();
        assert!(matches!(&err, ComposeError::UnknownComposition { name } if name == "ghost"));
        assert!(err.hint().is_some());
    }

    #[test]
    fn registering_the_same_directory_twice_is_allowed() {
        let mut repo = Repository::new("/src", EngineConfig::default());
        repo.register("demo", "/src/demo").expect("first");
        repo.register("demo", "/src/demo").expect("second");
        assert_eq!(repo.compositions().count(), 1);
    }
}
