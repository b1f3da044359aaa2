//! Configuration management for policyrag
//!
//! TOML-based deployment configuration with built-in defaults.
//! Location: ~/.policyrag/config.toml (optional, never written)
//!
//! Only the two backend base addresses may be overridden from the
//! environment (`POLICYRAG_RETRIEVAL_URL`, `POLICYRAG_GENERATION_URL`).

use crate::errors::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the retrieval backend address
pub const RETRIEVAL_URL_ENV: &str = "POLICYRAG_RETRIEVAL_URL";

/// Environment variable overriding the generation backend address
pub const GENERATION_URL_ENV: &str = "POLICYRAG_GENERATION_URL";

/// Default number of passages requested per query
pub const DEFAULT_MAX_RESPONSES: usize = 5;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Retrieval backend connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub base_url: String,
    pub max_responses: usize,
}

/// Generation backend connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
}

/// HTTP client tuning
///
/// Only the connect phase can be bounded; summary streams run until the
/// backend finishes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            max_responses: DEFAULT_MAX_RESPONSES,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::load_default()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location if present, else built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".policyrag").join("config.toml"))
    }

    /// Override backend addresses from a variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(RETRIEVAL_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.retrieval.base_url = url;
        }
        if let Some(url) = lookup(GENERATION_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.generation.base_url = url;
        }
        self.normalize();
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("retrieval.base_url", &self.retrieval.base_url),
            ("generation.base_url", &self.generation.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ClientError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.retrieval.max_responses == 0 {
            return Err(ClientError::Config(
                "max_responses must be greater than 0".to_string(),
            ));
        }

        if self.generation.model.trim().is_empty() {
            return Err(ClientError::Config("model must not be empty".to_string()));
        }

        Ok(())
    }

    fn normalize(&mut self) {
        trim_trailing_slash(&mut self.retrieval.base_url);
        trim_trailing_slash(&mut self.generation.base_url);
    }
}

fn trim_trailing_slash(url: &mut String) {
    while url.ends_with('/') {
        url.pop();
    }
}
