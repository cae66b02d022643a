//! # mzcompose-compose
//!
//! The data half of the composition engine.
//!
//! Handles:
//! - **Service**: The typed [`ServiceConfig`](service::ServiceConfig) model,
//!   including the mzcompose extension keys.
//! - **Spec**: The live [`Specification`](spec::Specification) document and
//!   its rendering into the compose file format.
//! - **Munge**: Normalization of raw service definitions: port policy,
//!   ownership propagation, coverage injection, and build-reference
//!   substitution.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod munge;
pub mod service;
pub mod spec;

pub use munge::{munge, MungePolicy, Munged};
pub use service::{Port, Service, ServiceConfig};
pub use spec::Specification;
