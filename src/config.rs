//! TOML configuration
//!
//! Every field has a default, so an empty file (or no file at all) is valid.
//! `OLLAMA_HOST` and `OLLAMA_MODEL` override the `[ollama]` section.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backends::RETAIL_SYNC_MARKER;
use crate::classify::DEFAULT_RECEIPT_THRESHOLD;
use crate::matching::MatchConfig;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:4b";

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matching: MatchConfig,
    pub classifier: ClassifierConfig,
    pub ollama: OllamaConfig,
    pub api: ApiConfig,
}

/// Which receipt classifier a run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    /// Keyword weights, no network
    #[default]
    Rules,
    /// Verdict from the model in `[ollama]`
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    /// Keyword score an email must reach to be treated as a receipt
    pub threshold: i32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::Rules,
            threshold: DEFAULT_RECEIPT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    /// Tags written by other reconcilers that count as already reconciled
    pub equivalent_markers: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1".to_string(),
            token_env: "LEDGER_API_TOKEN".to_string(),
            equivalent_markers: vec![RETAIL_SYNC_MARKER.to_string()],
        }
    }
}

impl ApiConfig {
    /// Bearer token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

impl Config {
    /// Load a config file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse config text without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("OLLAMA_HOST").ok(),
            std::env::var("OLLAMA_MODEL").ok(),
        );
    }

    fn apply_overrides(&mut self, host: Option<String>, model: Option<String>) {
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.ollama.host = host;
        }
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            self.ollama.model = model;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let matching = &self.matching;
        if matching.date_window_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "matching.date_window_days must not be negative, got {}",
                matching.date_window_days
            )));
        }
        if !(0.0..=1.0).contains(&matching.similarity_threshold) {
            return Err(ConfigError::Invalid(format!(
                "matching.similarity_threshold must be within [0, 1], got {}",
                matching.similarity_threshold
            )));
        }
        if matching.marker_tag.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "matching.marker_tag must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
