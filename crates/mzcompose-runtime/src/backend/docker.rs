//! Runtime backend that shells out to the docker CLI.

use std::io::Write;
use std::process::{Command, Stdio};

use mzcompose_common::constants::DEFAULT_DOCKER_BINARY;
use mzcompose_common::error::{ComposeError, Result};

use super::{ComposeRuntime, Invocation, InvocationOutput, Program, Project};

/// Runs `docker compose` (and `docker`) as child processes.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BINARY)
    }
}

impl DockerCli {
    /// Creates a backend that runs `binary`.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Builds the full argument vector for an invocation.
    fn command_args(project: &Project<'_>, invocation: &Invocation) -> Vec<String> {
        let mut args = Vec::with_capacity(invocation.args.len() + 6);
        if invocation.program == Program::Compose {
            args.push("compose".to_string());
            args.push("-f".to_string());
            args.push(project.file.display().to_string());
            args.push("--project-directory".to_string());
            args.push(project.directory.display().to_string());
            if let Some(name) = project.name {
                args.push("--project-name".to_string());
                args.push(name.to_string());
            }
        }
        args.extend(invocation.args.iter().cloned());
        args
    }
}

fn stdio(capture: bool) -> Stdio {
    if capture { Stdio::piped() } else { Stdio::inherit() }
}

impl ComposeRuntime for DockerCli {
    fn invoke(&self, project: &Project<'_>, invocation: &Invocation) -> Result<InvocationOutput> {
        let spawn_err = |source| ComposeError::Spawn {
            program: self.binary.clone(),
            source,
        };

        let mut child = Command::new(&self.binary)
            .args(Self::command_args(project, invocation))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdout(stdio(invocation.capture_stdout))
            .stderr(stdio(invocation.capture_stderr))
            .spawn()
            .map_err(spawn_err)?;

        // Stdin is written from its own thread while the output pipes drain.
        let writer = match (child.stdin.take(), invocation.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(std::thread::spawn(move || {
                pipe.write_all(input.as_bytes())
            })),
            _ => None,
        };

        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "failed to write stdin"),
                Err(_) => tracing::warn!("stdin writer panicked"),
            }
        }

        Ok(InvocationOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn project<'a>(name: Option<&'a str>) -> Project<'a> {
        Project {
            file: Path::new("/tmp/mzcompose-spec.yml"),
            directory: Path::new("/src/test/demo"),
            name,
        }
    }

    #[test]
    fn compose_args_carry_project_flags() {
        let args = DockerCli::command_args(&project(None), &Invocation::compose(["ps"]));
        assert_eq!(
            args,
            vec![
                "compose",
                "-f",
                "/tmp/mzcompose-spec.yml",
                "--project-directory",
                "/src/test/demo",
                "ps"
            ]
        );
    }

    #[test]
    fn explicit_project_name_is_passed() {
        let args = DockerCli::command_args(&project(Some("ci-42")), &Invocation::compose(["down"]));
        let pos = args.iter().position(|a| a == "--project-name").expect("flag");
        assert_eq!(args[pos + 1], "ci-42");
        assert_eq!(args.last().map(String::as_str), Some("down"));
    }

    #[test]
    fn docker_args_skip_project_flags() {
        let args = DockerCli::command_args(
            &project(Some("ci")),
            &Invocation::docker(["volume", "rm", "demo_pgdata"]),
        );
        assert_eq!(args, vec!["volume", "rm", "demo_pgdata"]);
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let cli = DockerCli::new("/nonexistent/docker-binary");
        assert!(!cli.is_available());
        let err = cli
            .invoke(&project(None), &Invocation::compose(["ps"]))
            .unwrap_err();
        assert!(matches!(err, ComposeError::Spawn { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[test]
    fn captured_output_and_exit_code_are_reported() {
        // `echo` ignores the compose flags and prints them back.
        let cli = DockerCli::new("echo");
        let out = cli
            .invoke(
                &project(None),
                &Invocation::compose(["port", "postgres", "5432"]).capture_stdout(true),
            )
            .expect("invoke");
        assert!(out.is_success());
        assert!(out.stdout.trim_end().ends_with("port postgres 5432"), "got: {}", out.stdout);
    }

    #[cfg(unix)]
    #[test]
    fn stdin_is_delivered() {
        let cli = DockerCli::new("cat");
        let out = cli
            .invoke(
                &project(None),
                &Invocation::docker(Vec::<String>::new())
                    .capture_stdout(true)
                    .stdin(Some("SELECT 1;\n".into())),
            )
            .expect("invoke");
        assert_eq!(out.stdout, "SELECT 1;\n");
    }
}
