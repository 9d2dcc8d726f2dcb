//! Generic loader for lists of items stored under a top-level key of a YAML
//! file, used for the static default alert policies.

use std::{fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A generic loader for YAML files.
pub struct ConfigLoader {
    path: PathBuf,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file could not be read.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file could not be parsed, or the key is missing.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The file does not have a YAML extension.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads a vector of items stored under `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let config_str = fs::read_to_string(&self.path)?;

        let config =
            Config::builder().add_source(File::from_str(&config_str, FileFormat::Yaml)).build()?;

        let items = config.get(key)?;

        Ok(items)
    }

    /// Like [`ConfigLoader::load`], but a missing file yields an empty list.
    pub fn load_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Optional configuration file not found.");
            return Ok(Vec::new());
        }
        self.load(key)
    }

    fn is_yaml_file(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;
    use crate::models::{AlertPolicy, ChannelKind, Severity};

    fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
        let path = dir.path().join(filename);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_load_default_policies() {
        let dir = TempDir::new().unwrap();
        let content = r#"
default_policies:
  - route_group: login
    severity: high
    cooldown_ms: 300000
    channels: [slack, sentry]
  - route_group: weather
    enabled: false
"#;
        let path = create_test_file(&dir, "policies.yaml", content);
        let policies: Vec<AlertPolicy> = ConfigLoader::new(path).load("default_policies").unwrap();

        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].route_group, "login");
        assert_eq!(policies[0].severity, Severity::High);
        assert!(policies[0].channels.contains(&ChannelKind::Slack));
        assert!(!policies[1].enabled);
        assert_eq!(policies[1].severity, Severity::Medium);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(dir.path().join("nonexistent.yaml"));
        let result: Result<Vec<AlertPolicy>, _> = loader.load("default_policies");
        assert!(matches!(result.unwrap_err(), LoaderError::IoError(_)));

        let optional: Vec<AlertPolicy> = loader.load_optional("default_policies").unwrap();
        assert!(optional.is_empty());
    }

    #[test]
    fn test_load_invalid_yaml_syntax() {
        let dir = TempDir::new().unwrap();
        let content = "default_policies: [ { route_group: 'a' }, { route_group: 'b'";
        let path = create_test_file(&dir, "invalid.yaml", content);
        let result: Result<Vec<AlertPolicy>, _> =
            ConfigLoader::new(path).load("default_policies");
        assert!(matches!(result.unwrap_err(), LoaderError::ParseError(_)));
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "policies.txt", "default_policies: []");
        let result: Result<Vec<AlertPolicy>, _> =
            ConfigLoader::new(path).load("default_policies");
        assert!(matches!(result.unwrap_err(), LoaderError::UnsupportedFormat));
    }

    #[test]
    fn test_load_missing_top_level_key() {
        let dir = TempDir::new().unwrap();
        let content = "wrong_key:\n  - route_group: login\n";
        let path = create_test_file(&dir, "policies.yaml", content);
        let result: Result<Vec<AlertPolicy>, _> =
            ConfigLoader::new(path).load("default_policies");
        assert!(matches!(result.unwrap_err(), LoaderError::ParseError(_)));
    }
}
