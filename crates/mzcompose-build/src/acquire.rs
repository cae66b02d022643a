//! Image acquisition through the docker CLI.
//!
//! An image is acquired by the cheapest available means: it is left alone if
//! the daemon already has it, pulled if it is published (and the session is
//! online), and built from its context otherwise.

use std::process::{Command, ExitStatus, Stdio};

use mzcompose_common::error::{ComposeError, Result};

use crate::resolver::{Acquire, ResolvedImage};

/// Acquires images by shelling out to `docker`.
#[derive(Debug, Clone)]
pub struct DockerAcquirer {
    docker: String,
    offline: bool,
}

impl DockerAcquirer {
    /// Creates an acquirer that invokes `docker_binary`.
    #[must_use]
    pub fn new(docker_binary: impl Into<String>, offline: bool) -> Self {
        Self {
            docker: docker_binary.into(),
            offline,
        }
    }

    /// Runs `command`, reporting a failure to start docker as a failure to
    /// acquire `image`.
    fn status(&self, image: &ResolvedImage, command: &mut Command) -> Result<ExitStatus> {
        command.status().map_err(|e| ComposeError::Acquisition {
            image: image.spec.clone(),
            message: format!("failed to spawn {}: {e}", self.docker),
        })
    }

    fn quiet(&self, image: &ResolvedImage, args: &[&str]) -> Result<bool> {
        let mut command = Command::new(&self.docker);
        let _ = command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok(self.status(image, &mut command)?.success())
    }

    fn is_present(&self, image: &ResolvedImage) -> Result<bool> {
        self.quiet(image, &["image", "inspect", &image.spec])
    }

    fn pull(&self, image: &ResolvedImage) -> Result<bool> {
        tracing::info!(spec = %image.spec, "pulling image");
        self.quiet(image, &["pull", &image.spec])
    }

    fn build(&self, image: &ResolvedImage) -> Result<()> {
        let context = image.context.as_ref().ok_or_else(|| ComposeError::Acquisition {
            image: image.spec.clone(),
            message: "image is not present locally and has no build context".into(),
        })?;
        tracing::info!(spec = %image.spec, context = %context.display(), "building image");
        let mut command = Command::new(&self.docker);
        let _ = command
            .arg("build")
            .arg("--tag")
            .arg(&image.spec)
            .arg(context)
            .stdin(Stdio::null());
        let status = self.status(image, &mut command)?;
        if status.success() {
            Ok(())
        } else {
            Err(ComposeError::Acquisition {
                image: image.spec.clone(),
                message: format!("docker build exited with {status}"),
            })
        }
    }
}

impl Acquire for DockerAcquirer {
    fn acquire(&self, image: &ResolvedImage) -> Result<()> {
        if self.is_present(image)? {
            tracing::debug!(spec = %image.spec, "image already present");
            return Ok(());
        }
        if image.publish && !self.offline && self.pull(image)? {
            return Ok(());
        }
        self.build(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(context: Option<std::path::PathBuf>) -> ResolvedImage {
        ResolvedImage {
            name: "materialized".into(),
            spec: "materialize/materialized:mzbuild-0".into(),
            context,
            publish: true,
        }
    }

    #[test]
    fn missing_binary_fails_acquisition() {
        let acquirer = DockerAcquirer::new("/nonexistent/docker-binary", true);
        let err = acquirer.acquire(&image(None)).unwrap_err();
        match err {
            ComposeError::Acquisition { image, message } => {
                assert_eq!(image, "materialize/materialized:mzbuild-0");
                assert!(message.contains("/nonexistent/docker-binary"), "got: {message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn absent_image_without_context_fails_acquisition() {
        // `false` exits non-zero for every query, so the image is never present.
        let acquirer = DockerAcquirer::new("false", true);
        let err = acquirer.acquire(&image(None)).unwrap_err();
        assert!(matches!(err, ComposeError::Acquisition { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn present_image_is_not_rebuilt() {
        // `true` reports success for `image inspect`.
        let acquirer = DockerAcquirer::new("true", false);
        acquirer.acquire(&image(None)).expect("acquire");
    }
}
