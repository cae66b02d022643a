//! The build-resolution contract consumed by the specification munger.
//!
//! A [`BuildResolver`] answers two questions: whether a build reference names
//! a known artifact, and which concrete images a batch of references resolves
//! to. The answer is a [`DependencySet`], which must be
//! [acquired](DependencySet::acquire) before containers that use it can start.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use mzcompose_common::error::{ComposeError, Result};

/// A build reference resolved to a concrete, content-addressed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Abstract build-reference name, e.g. `materialized`.
    pub name: String,
    /// Concrete image reference handed to the runtime.
    pub spec: String,
    /// Build context, if the image can be built locally.
    pub context: Option<PathBuf>,
    /// Whether the image is expected to exist in a remote registry.
    pub publish: bool,
}

/// Makes one resolved image available to the container runtime.
pub trait Acquire: Send + Sync + fmt::Debug {
    /// Ensures `image` is present locally, pulling or building as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Acquisition`] if the image cannot be made available.
    fn acquire(&self, image: &ResolvedImage) -> Result<()>;
}

/// Resolves abstract build references into concrete images.
pub trait BuildResolver: Send + Sync {
    /// Returns whether `name` is a known build target.
    fn contains(&self, name: &str) -> bool;

    /// Resolves a batch of build references, including any images they
    /// transitively depend on.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnknownBuildTarget`] if any name is unknown,
    /// or another error if fingerprinting fails.
    fn resolve(&self, names: &[String]) -> Result<DependencySet>;
}

/// The resolved images for a specification, in acquisition order.
///
/// Acquisition is idempotent: once it succeeds, later calls return
/// immediately.
pub struct DependencySet {
    images: Vec<ResolvedImage>,
    acquirer: Option<Arc<dyn Acquire>>,
    acquired: AtomicBool,
}

impl DependencySet {
    /// Creates a set that needs no acquisition.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            images: Vec::new(),
            acquirer: None,
            acquired: AtomicBool::new(false),
        }
    }

    /// Creates a set whose images are acquired, in order, by `acquirer`.
    #[must_use]
    pub fn new(images: Vec<ResolvedImage>, acquirer: Arc<dyn Acquire>) -> Self {
        Self {
            images,
            acquirer: Some(acquirer),
            acquired: AtomicBool::new(false),
        }
    }

    /// Looks up the resolved image for a build reference.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedImage> {
        self.images.iter().find(|i| i.name == name)
    }

    /// Returns the concrete image reference for a build reference.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&str> {
        self.get(name).map(|i| i.spec.as_str())
    }

    /// Iterates over the resolved images in acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedImage> {
        self.images.iter()
    }

    /// Number of resolved images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns whether the set contains no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Makes every image in the set available to the runtime.
    ///
    /// # Errors
    ///
    /// Returns the first acquisition failure. A failed acquisition may be
    /// retried.
    pub fn acquire(&self) -> Result<()> {
        if self.acquired.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(acquirer) = &self.acquirer {
            for image in &self.images {
                tracing::info!(image = %image.name, spec = %image.spec, "acquiring image");
                acquirer.acquire(image)?;
            }
        }
        self.acquired.store(true, Ordering::Release);
        Ok(())
    }
}

impl Default for DependencySet {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencySet")
            .field("images", &self.images)
            .field("acquired", &self.acquired.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// An in-memory resolver with a fixed name-to-image table.
///
/// Records every acquisition, which makes it suitable for embedding
/// programs that pre-build their images and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    images: BTreeMap<String, String>,
    log: Arc<AcquisitionLog>,
}

#[derive(Debug, Default)]
struct AcquisitionLog {
    acquired: Mutex<Vec<String>>,
}

impl Acquire for AcquisitionLog {
    fn acquire(&self, image: &ResolvedImage) -> Result<()> {
        self.acquired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image.name.clone());
        Ok(())
    }
}

impl StaticResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a build target and its concrete image reference.
    #[must_use]
    pub fn with_image(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
        let _ = self.images.insert(name.into(), spec.into());
        self
    }

    /// Names of every image acquired so far, in acquisition order.
    #[must_use]
    pub fn acquired(&self) -> Vec<String> {
        self.log
            .acquired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BuildResolver for StaticResolver {
    fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    fn resolve(&self, names: &[String]) -> Result<DependencySet> {
        let mut images: Vec<ResolvedImage> = Vec::new();
        for name in names {
            let spec = self
                .images
                .get(name)
                .ok_or_else(|| ComposeError::UnknownBuildTarget { name: name.clone() })?;
            if images.iter().any(|i| &i.name == name) {
                continue;
            }
            images.push(ResolvedImage {
                name: name.clone(),
                spec: spec.clone(),
                context: None,
                publish: true,
            });
        }
        let acquirer: Arc<dyn Acquire> = self.log.clone();
        Ok(DependencySet::new(images, acquirer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with_image("materialized", "materialize/materialized:mzbuild-abc")
            .with_image("testdrive", "materialize/testdrive:mzbuild-def")
    }

    #[test]
    fn resolve_maps_names_to_specs() {
        let deps = resolver()
            .resolve(&["materialized".into()])
            .expect("resolve");
        assert_eq!(deps.len(), 1);
        assert_eq!(
            deps.spec("materialized"),
            Some("materialize/materialized:mzbuild-abc")
        );
        assert_eq!(deps.spec("testdrive"), None);
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let err = resolver().resolve(&["ghost".into()]).unwrap_err();
        assert!(matches!(err, ComposeError::UnknownBuildTarget { name } if name == "ghost"));
    }

    #[test]
    fn resolve_deduplicates_repeated_names() {
        let deps = resolver()
            .resolve(&["testdrive".into(), "testdrive".into()])
            .expect("resolve");
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn acquire_is_idempotent() {
        let resolver = resolver();
        let deps = resolver
            .resolve(&["materialized".into(), "testdrive".into()])
            .expect("resolve");
        deps.acquire().expect("first acquire");
        deps.acquire().expect("second acquire");
        assert_eq!(resolver.acquired(), vec!["materialized", "testdrive"]);
    }

    #[test]
    fn empty_set_acquires_trivially() {
        let deps = DependencySet::empty();
        assert!(deps.is_empty());
        deps.acquire().expect("acquire");
    }
}
