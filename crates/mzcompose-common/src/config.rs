//! Engine configuration model.

use serde::{Deserialize, Serialize};

/// Root configuration for loading and driving compositions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bind every container port without a host binding to the same host port.
    pub preserve_ports: bool,
    /// Inject coverage instrumentation into every service.
    pub coverage: bool,
    /// Log runtime invocations at debug level instead of info.
    pub silent: bool,
    /// Run the specification munger while loading. Disabling it leaves build
    /// references unresolved and is only useful for inspection.
    pub munge_services: bool,
    /// Explicit project name passed to the runtime instead of its default.
    pub project_name: Option<String>,
    /// Never pull images from a registry during acquisition.
    pub offline: bool,
    /// Container runtime binary.
    pub docker_binary: String,
    /// File name of the per-composition definition manifest.
    pub manifest_file: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preserve_ports: false,
            coverage: false,
            silent: false,
            munge_services: true,
            project_name: None,
            offline: false,
            docker_binary: crate::constants::DEFAULT_DOCKER_BINARY.to_string(),
            manifest_file: crate::constants::MANIFEST_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"coverage": true}"#).expect("deserialize");
        assert!(cfg.coverage);
        assert!(cfg.munge_services);
        assert_eq!(cfg.docker_binary, "docker");
        assert_eq!(cfg.manifest_file, "mzcompose.yml");
    }
}
