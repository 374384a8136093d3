//! Audience core configuration

use crate::error::{AudienceError, AudienceResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the JSON config file
pub const CONFIG_PATH_ENV: &str = "AUDIENCE_CONFIG_PATH";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceConfig {
    /// Condition evaluation settings
    pub evaluation: EvaluationConfig,
    /// Membership cache settings
    pub cache: CacheConfig,
    /// Tag hierarchy settings
    pub tags: TagConfig,
    /// Key-value persistence settings
    pub storage: StorageConfig,
}

impl AudienceConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> AudienceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> AudienceResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `AUDIENCE_CONFIG_PATH`, falling back to defaults
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(CONFIG_PATH_ENV) else {
            return Self::default();
        };

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path, error = %e, "config not loaded, using defaults");
            Self::default()
        })
    }

    /// Reject settings the core cannot run with
    pub fn validate(&self) -> AudienceResult<()> {
        if self.cache.max_capacity == 0 {
            return Err(AudienceError::Config("cache.max_capacity must be positive".into()));
        }
        if self.tags.max_depth == 0 {
            return Err(AudienceError::Config("tags.max_depth must be positive".into()));
        }
        if self.evaluation.list_delimiter.is_whitespace() {
            return Err(AudienceError::Config("evaluation.list_delimiter cannot be whitespace".into()));
        }
        if self.storage.key_prefix.trim().is_empty() {
            return Err(AudienceError::Config("storage.key_prefix cannot be empty".into()));
        }
        Ok(())
    }
}

/// How text operators compare strings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    /// Byte-for-byte comparison
    #[default]
    CaseSensitive,
    /// Unicode lower-case folding on both sides
    CaseInsensitive,
}

/// Condition evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Case handling for text operators
    pub text_match: TextMatch,
    /// Separator for delimited `IN_LIST` operands
    pub list_delimiter: char,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            text_match: TextMatch::CaseSensitive,
            list_delimiter: ',',
        }
    }
}

/// Membership cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached segments
    pub max_capacity: u64,
    /// Entry lifetime in seconds
    pub time_to_live_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live_secs: 300,
        }
    }
}

/// Tag hierarchy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Deepest allowed nesting (a root tag has depth 1)
    pub max_depth: usize,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

/// Key-value persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prefix for every persisted key
    pub key_prefix: String,
    /// File backing the JSON key-value store, if any
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: "audience".into(),
            snapshot_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AudienceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.evaluation.text_match, TextMatch::CaseSensitive);
        assert_eq!(config.evaluation.list_delimiter, ',');
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AudienceConfig =
            serde_json::from_str(r#"{"evaluation": {"text_match": "case_insensitive"}}"#).unwrap();
        assert_eq!(config.evaluation.text_match, TextMatch::CaseInsensitive);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audience.json");

        let mut config = AudienceConfig::default();
        config.tags.max_depth = 3;
        config.save(&path).unwrap();

        assert_eq!(AudienceConfig::load(&path).unwrap(), config);
    }

    // One test owns the variable so parallel tests never race on it
    #[test]
    fn test_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audience.json");
        let mut config = AudienceConfig::default();
        config.cache.max_capacity = 42;
        config.save(&path).unwrap();

        std::env::set_var(CONFIG_PATH_ENV, &path);
        assert_eq!(AudienceConfig::from_env(), config);

        std::env::set_var(CONFIG_PATH_ENV, dir.path().join("missing.json"));
        assert_eq!(AudienceConfig::from_env(), AudienceConfig::default());

        std::env::remove_var(CONFIG_PATH_ENV);
        assert_eq!(AudienceConfig::from_env(), AudienceConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audience.json");
        std::fs::write(&path, r#"{"cache": {"max_capacity": 0}}"#).unwrap();

        assert!(matches!(AudienceConfig::load(&path), Err(AudienceError::Config(_))));
    }
}
