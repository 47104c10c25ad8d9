//! Configuration for credvault
//!
//! Defaults, optionally overlaid by a JSON file and then by `CREDVAULT_*`
//! environment variables.

use crate::core::PersistenceType;
use crate::errors::CredentialError;
use crate::infra::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest secret, in UTF-16 code units, accepted for a vault write
pub const DEFAULT_MAX_SECRET_UNITS: usize = 512;

const ENV_MAX_SECRET_UNITS: &str = "CREDVAULT_MAX_SECRET_UNITS";
const ENV_DEFAULT_PERSISTENCE: &str = "CREDVAULT_DEFAULT_PERSISTENCE";
const ENV_LOG_FILTER: &str = "CREDVAULT_LOG_FILTER";
const ENV_LOG_DIR: &str = "CREDVAULT_LOG_DIR";

/// Store and logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Secrets longer than this are rejected before the vault is contacted
    pub max_secret_utf16_units: usize,
    /// Persistence given to credentials created through the manager
    pub default_persistence: PersistenceType,
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Directory for the log file; console only when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            max_secret_utf16_units: DEFAULT_MAX_SECRET_UNITS,
            default_persistence: PersistenceType::Session,
            log_filter: "info".to_string(),
            log_dir: None,
        }
    }
}

impl VaultConfig {
    /// Reads a JSON configuration file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path).map_err(|e| CredentialError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: VaultConfig = serde_json::from_str(&content).map_err(|e| CredentialError::Json {
            context: format!("configuration file {}", path.display()),
            source: e,
        })?;
        config.validated()
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Configuration file at the default path if present, then environment overrides
    pub fn load() -> Result<Self, CredentialError> {
        let base = match paths::config_file_path() {
            Ok(path) if path.exists() => {
                debug!(path = ?path, "Loading configuration file");
                Self::from_json_file(&path)?
            }
            _ => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (normally the process environment)
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_SECRET_UNITS) {
            self.max_secret_utf16_units = value.trim().parse().map_err(|e| CredentialError::Config {
                reason: format!("{} must be a positive integer, got '{}'", ENV_MAX_SECRET_UNITS, value),
                source: Some(anyhow::Error::new(e)),
            })?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_PERSISTENCE) {
            self.default_persistence = value.parse()?;
        }
        if let Some(value) = lookup(ENV_LOG_FILTER) {
            self.log_filter = value;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.log_dir = (!value.trim().is_empty()).then(|| PathBuf::from(value));
        }
        self.validated()
    }

    fn validated(self) -> Result<Self, CredentialError> {
        if self.max_secret_utf16_units == 0 {
            return Err(CredentialError::Config {
                reason: "max_secret_utf16_units must be greater than zero".to_string(),
                source: None,
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.max_secret_utf16_units, 512);
        assert_eq!(config.default_persistence, PersistenceType::Session);
        assert_eq!(config.log_filter, "info");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_json_file_with_partial_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_persistence": "LocalComputer", "log_filter": "debug"}"#).unwrap();

        let config = VaultConfig::from_json_file(&path).unwrap();
        assert_eq!(config.default_persistence, PersistenceType::LocalComputer);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.max_secret_utf16_units, 512);
    }

    #[test]
    fn test_json_file_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            VaultConfig::from_json_file(&path),
            Err(CredentialError::Json { .. })
        ));
        assert!(matches!(
            VaultConfig::from_json_file(&temp_dir.path().join("missing.json")),
            Err(CredentialError::Io { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = VaultConfig::default()
            .with_overrides(lookup(&[
                ("CREDVAULT_MAX_SECRET_UNITS", "256"),
                ("CREDVAULT_DEFAULT_PERSISTENCE", "enterprise"),
                ("CREDVAULT_LOG_DIR", "/tmp/credvault-logs"),
            ]))
            .unwrap();
        assert_eq!(config.max_secret_utf16_units, 256);
        assert_eq!(config.default_persistence, PersistenceType::Enterprise);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/credvault-logs")));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(VaultConfig::default()
            .with_overrides(lookup(&[("CREDVAULT_MAX_SECRET_UNITS", "lots")]))
            .is_err());
        assert!(VaultConfig::default()
            .with_overrides(lookup(&[("CREDVAULT_MAX_SECRET_UNITS", "0")]))
            .is_err());
        assert!(VaultConfig::default()
            .with_overrides(lookup(&[("CREDVAULT_DEFAULT_PERSISTENCE", "forever")]))
            .is_err());
    }
}
