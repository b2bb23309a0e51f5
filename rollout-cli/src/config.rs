use std::collections::BTreeMap;
use std::env;

use rollout_lib::Options;
use serde::Deserialize;

/// Top-level rollout.toml configuration
#[derive(Debug, Deserialize, Default)]
pub struct RolloutConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub options: Options,
    /// Group name to the identities that belong to it.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
    /// Locales matched against the `--locale` given on the command line.
    #[serde(default)]
    pub locales: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sled
}

fn default_data_dir() -> String {
    "./rollout-data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

impl RolloutConfig {
    /// Load configuration from a TOML file. A missing file means defaults,
    /// a file that does not parse is an error.
    pub fn load(path: &str) -> Result<Self, String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| format!("failed to parse {}: {}", path, e)),
            Err(_) => {
                tracing::debug!(path, "no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        // ROLLOUT_STORAGE
        if let Ok(val) = env::var("ROLLOUT_STORAGE") {
            match val.to_lowercase().as_str() {
                "sled" => self.storage.backend = StorageBackend::Sled,
                "memory" => self.storage.backend = StorageBackend::Memory,
                other => tracing::warn!("unknown ROLLOUT_STORAGE value: {}", other),
            }
        }

        // ROLLOUT_DATA_DIR
        if let Ok(val) = env::var("ROLLOUT_DATA_DIR") {
            if !val.trim().is_empty() {
                self.storage.data_dir = val;
            }
        }

        // ROLLOUT_RANDOMIZE_PERCENTAGE
        if let Ok(val) = env::var("ROLLOUT_RANDOMIZE_PERCENTAGE") {
            self.options.randomize_percentage = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RolloutConfig::parse("").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sled);
        assert_eq!(config.storage.data_dir, "./rollout-data");
        assert_eq!(config.options, Options::default());
        assert!(config.groups.is_empty());
        assert!(config.locales.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = RolloutConfig::parse(
            r#"
locales = ["fr", "de"]

[storage]
backend = "memory"
data_dir = "/var/lib/rollout"

[options]
randomize_percentage = true
migrate = true

[groups]
beta = ["alice", "bob"]
staff = ["carol"]
"#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.data_dir, "/var/lib/rollout");
        assert!(config.options.randomize_percentage);
        assert!(config.options.migrate);
        assert_eq!(config.groups["beta"], vec!["alice", "bob"]);
        assert_eq!(config.locales, vec!["fr", "de"]);
    }

    #[test]
    fn test_unknown_backend_is_an_error() {
        assert!(RolloutConfig::parse("[storage]\nbackend = \"redis\"").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = RolloutConfig::load("/definitely/not/here/rollout.toml").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sled);
    }
}
