//! On-disk catalog of buildable images.
//!
//! Every directory under the repository root containing an `mzbuild.yml`
//! file defines one image; the directory is its build context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mzcompose_common::constants::{DEFAULT_IMAGE_PREFIX, MZBUILD_FILE};
use mzcompose_common::error::{ComposeError, Result};
use serde::Deserialize;

use crate::acquire::DockerAcquirer;
use crate::graph::ImageGraph;
use crate::resolver::{Acquire, BuildResolver, DependencySet, ResolvedImage};

/// Number of fingerprint hex characters used in an image tag.
const TAG_FINGERPRINT_LEN: usize = 32;

/// Contents of an `mzbuild.yml` file.
#[derive(Debug, Clone, Deserialize)]
struct ImageManifest {
    name: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default = "default_publish")]
    publish: bool,
}

const fn default_publish() -> bool {
    true
}

/// One buildable image discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    /// Image name used as a build reference.
    pub name: String,
    /// Build context directory.
    pub context: PathBuf,
    /// Names of images this image is built on.
    pub depends_on: Vec<String>,
    /// Whether the image is published to a remote registry.
    pub publish: bool,
}

/// Image catalog discovered from a source tree.
#[derive(Debug)]
pub struct ImageRepository {
    images: BTreeMap<String, ImageDefinition>,
    prefix: String,
    acquirer: Arc<dyn Acquire>,
}

impl ImageRepository {
    /// Discovers every image definition under `root`.
    ///
    /// Images are acquired through the docker CLI named by `docker_binary`;
    /// when `offline` is set, acquisition never pulls from a registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be walked, a manifest cannot be
    /// parsed, two images share a name, or an image depends on an unknown
    /// image.
    pub fn discover(root: &Path, docker_binary: &str, offline: bool) -> Result<Self> {
        let acquirer: Arc<dyn Acquire> = Arc::new(DockerAcquirer::new(docker_binary, offline));
        Self::discover_with(root, acquirer)
    }

    /// Discovers every image definition under `root`, acquiring with `acquirer`.
    ///
    /// # Errors
    ///
    /// See [`ImageRepository::discover`].
    pub fn discover_with(root: &Path, acquirer: Arc<dyn Acquire>) -> Result<Self> {
        tracing::info!(root = %root.display(), "discovering mzbuild images");
        let mut images: BTreeMap<String, ImageDefinition> = BTreeMap::new();

        let walker = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                e.depth() == 0
                    || !(e.file_type().is_dir() && (name == ".git" || name == "target"))
            });
        for entry in walker {
            let entry = entry.map_err(|e| ComposeError::Io {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() || entry.file_name() != MZBUILD_FILE {
                continue;
            }
            let definition = load_definition(entry.path())?;
            if let Some(existing) = images.get(&definition.name) {
                return Err(ComposeError::Config {
                    message: format!(
                        "image {:?} is defined in both {} and {}",
                        definition.name,
                        existing.context.display(),
                        definition.context.display()
                    ),
                });
            }
            tracing::debug!(image = %definition.name, context = %definition.context.display(), "found image");
            let _ = images.insert(definition.name.clone(), definition);
        }

        for image in images.values() {
            if let Some(missing) = image.depends_on.iter().find(|d| !images.contains_key(*d)) {
                return Err(ComposeError::Config {
                    message: format!(
                        "image {:?} depends on unknown image {missing:?}",
                        image.name
                    ),
                });
            }
        }

        Ok(Self {
            images,
            prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            acquirer,
        })
    }

    /// Sets the repository prefix used in resolved image references.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Looks up an image definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ImageDefinition> {
        self.images.get(name)
    }

    /// Iterates over all image definitions, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &ImageDefinition> {
        self.images.values()
    }

    /// Collects `names` and every image they transitively depend on.
    fn closure(&self, names: &[String]) -> Result<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<String> = names.to_vec();
        while let Some(name) = pending.pop() {
            let image = self
                .images
                .get(&name)
                .ok_or_else(|| ComposeError::UnknownBuildTarget { name: name.clone() })?;
            if seen.insert(name) {
                pending.extend(image.depends_on.iter().cloned());
            }
        }
        Ok(seen)
    }
}

impl BuildResolver for ImageRepository {
    fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    fn resolve(&self, names: &[String]) -> Result<DependencySet> {
        let closure = self.closure(names)?;

        let mut graph = ImageGraph::new();
        for name in &closure {
            let _ = graph.add_image(name);
            for dep in &self.images[name].depends_on {
                graph.add_dependency(name, dep);
            }
        }
        let order = graph.resolve_order()?;

        let mut fingerprints: BTreeMap<&str, String> = BTreeMap::new();
        let mut resolved = Vec::with_capacity(order.len());
        for name in &order {
            let image = &self.images[name];
            let deps: Vec<(String, String)> = image
                .depends_on
                .iter()
                .filter_map(|d| fingerprints.get(d.as_str()).map(|fp| (d.clone(), fp.clone())))
                .collect();
            let fp = crate::fingerprint::fingerprint(&image.context, &deps)?;
            let spec = format!(
                "{}/{}:mzbuild-{}",
                self.prefix,
                image.name,
                &fp[..TAG_FINGERPRINT_LEN]
            );
            tracing::debug!(image = %name, %spec, "resolved image");
            resolved.push(ResolvedImage {
                name: image.name.clone(),
                spec,
                context: Some(image.context.clone()),
                publish: image.publish,
            });
            let _ = fingerprints.insert(image.name.as_str(), fp);
        }

        Ok(DependencySet::new(resolved, self.acquirer.clone()))
    }
}

fn load_definition(manifest_path: &Path) -> Result<ImageDefinition> {
    let content =
        std::fs::read_to_string(manifest_path).map_err(|e| ComposeError::io(manifest_path, e))?;
    let manifest: ImageManifest = serde_yaml::from_str(&content)?;
    let context = manifest_path
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);
    Ok(ImageDefinition {
        name: manifest.name,
        context,
        depends_on: manifest.depends_on,
        publish: manifest.publish,
    })
}
