//! # mzcompose-build
//!
//! Turns abstract build references into concrete image references.
//!
//! Handles:
//! - **Resolver**: The narrow [`BuildResolver`](resolver::BuildResolver)
//!   contract consumed by the specification munger, and the
//!   [`DependencySet`](resolver::DependencySet) it produces.
//! - **Repository**: Discovery of `mzbuild.yml` image definitions on disk.
//! - **Graph**: Topological ordering of image-to-image dependencies.
//! - **Fingerprint**: SHA-256 content addressing of build contexts.
//! - **Acquire**: Making resolved images available to the docker daemon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod acquire;
pub mod fingerprint;
pub mod graph;
pub mod repository;
pub mod resolver;

pub use resolver::{Acquire, BuildResolver, DependencySet, ResolvedImage, StaticResolver};
