use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ServiceError;

/// Common configuration shared by the dashboard service and the CLI.
///
/// Loaded from an optional TOML file, then overridden by `--key=value`
/// command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the REST backend.
    pub api_base: String,

    /// Identity allowed to edit and delete records it does not own.
    pub admin: Option<String>,

    /// Milliseconds a request may run before the load state reports a
    /// cold-starting backend.
    pub cold_start_ms: u64,

    /// Backend collection of quality-improvement items. Unset means the
    /// backend has none and quality items stay in process.
    pub quality_path: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000".to_string(),
            admin: None,
            cold_start_ms: 5000,
            quality_path: None,
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--api-base=URL`
    /// - `--admin=NAME`
    /// - `--cold-start-ms=N`
    /// - `--quality-path=PATH`
    ///
    /// Unknown flags are ignored; a malformed number keeps the default.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServiceConfig::default();
        config.apply_args(args);
        config
    }

    /// Apply `--key=value` overrides on top of the current values.
    pub fn apply_args(&mut self, args: &[String]) {
        for arg in args {
            if let Some(val) = arg.strip_prefix("--api-base=") {
                self.api_base = val.to_string();
            } else if let Some(val) = arg.strip_prefix("--admin=") {
                self.admin = if val.is_empty() { None } else { Some(val.to_string()) };
            } else if let Some(val) = arg.strip_prefix("--cold-start-ms=") {
                if let Ok(ms) = val.parse() {
                    self.cold_start_ms = ms;
                }
            } else if let Some(val) = arg.strip_prefix("--quality-path=") {
                self.quality_path = if val.is_empty() { None } else { Some(val.to_string()) };
            }
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content).map_err(|e| ServiceError::Validation(format!("config: {e}")))
    }

    /// Load config from disk, or return the default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Internal(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Cold-start threshold as a `Duration`.
    pub fn cold_start_after(&self) -> Duration {
        Duration::from_millis(self.cold_start_ms)
    }
}
