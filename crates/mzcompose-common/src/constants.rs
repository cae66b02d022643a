//! System-wide constants and default names.

/// Compose file format version written into every rendered specification.
pub const COMPOSE_VERSION: &str = "3.7";

/// Named volumes present in every composition, regardless of its services.
pub const DEFAULT_VOLUMES: [&str; 5] = ["mzdata", "pgdata", "mydata", "tmp", "secrets"];

/// Bind mount that exposes the host's coverage directory to instrumented services.
pub const COVERAGE_VOLUME: &str = "./coverage:/coverage";

/// Environment variable that tells instrumented binaries where to write profiles.
pub const COVERAGE_ENV_VAR: &str = "LLVM_PROFILE_FILE";

/// Returns the coverage profile path pattern for a service.
#[must_use]
pub fn coverage_profile_file(service: &str) -> String {
    format!("/coverage/{service}-%p-%9m%c.profraw")
}

/// Image tag suffixes indicating that the underlying image may change over time.
pub const VARIABLE_IMAGE_TAGS: [&str; 3] = [":latest", ":unstable", ":rolling"];

/// Entrypoint installed on every service by a persistent `up`.
pub const PERSISTENT_ENTRYPOINT: [&str; 2] = ["sleep", "infinity"];

/// Default signal delivered by `kill`.
pub const DEFAULT_KILL_SIGNAL: &str = "SIGKILL";

/// File name of the per-composition definition manifest.
pub const MANIFEST_FILE: &str = "mzcompose.yml";

/// File name that marks a directory as a buildable image.
pub const MZBUILD_FILE: &str = "mzbuild.yml";

/// Symbol prefix that marks a callable as a workflow.
pub const WORKFLOW_PREFIX: &str = "workflow_";

/// Default repository prefix for resolved image references.
pub const DEFAULT_IMAGE_PREFIX: &str = "materialize";

/// Default container runtime binary.
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "mzcompose";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_profile_is_namespaced_by_service() {
        assert_eq!(
            coverage_profile_file("materialized"),
            "/coverage/materialized-%p-%9m%c.profraw"
        );
    }
}
