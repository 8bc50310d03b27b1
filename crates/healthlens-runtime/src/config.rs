//! Runtime configuration.
//!
//! Loaded from YAML or JSON; durations are human-readable (`"30s"`,
//! `"1m 30s"`). A few settings can be overridden from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `HEALTHLENS_PROVIDER` | `provider` |
//! | `HEALTHLENS_MODEL` | `model` |
//! | `HEALTHLENS_TIMEOUT` | `timeout` |

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use healthlens_core::GenerationSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::{CompletionConfig, ModelProvider, ProviderError, ProviderRegistry};

/// At most one retry is ever made, whatever the configuration says.
pub const MAX_RETRIES: u32 = 1;

/// Errors loading runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid duration in {var}: {reason}")]
    InvalidDuration { var: String, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by every invocation of a runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Provider type, as registered in the [`ProviderRegistry`]
    pub provider: String,

    /// Provider-specific settings (credentials, base URL, stub replies)
    pub provider_config: JsonValue,

    /// Model used when a flow does not name one
    pub model: String,

    /// Bound on each model call
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    pub max_tokens: u32,

    pub temperature: f32,

    pub retry: RetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            provider_config: JsonValue::Object(Default::default()),
            model: "gemini-2.0-flash".to_string(),
            timeout: Duration::from_secs(60),
            max_tokens: 2048,
            temperature: 0.7,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for transient model failures.
///
/// Only flows marked `idempotent` are ever retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 or 1)
    pub max_retries: u32,

    /// Delay before the retry
    #[serde(with = "humantime_duration")]
    pub initial_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Configured retries, capped at [`MAX_RETRIES`].
    pub fn effective_retries(&self) -> u32 {
        self.max_retries.min(MAX_RETRIES)
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Self>(yaml)?.checked()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(json)?.checked()
    }

    /// Load a config file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Apply `HEALTHLENS_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `HEALTHLENS_*` overrides from any variable source.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(provider) = lookup("HEALTHLENS_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("HEALTHLENS_MODEL") {
            self.model = model;
        }
        if let Some(timeout) = lookup("HEALTHLENS_TIMEOUT") {
            self.timeout =
                humantime::parse_duration(&timeout).map_err(|e| ConfigError::InvalidDuration {
                    var: "HEALTHLENS_TIMEOUT".to_string(),
                    reason: e.to_string(),
                })?;
        }
        self.checked()
    }

    fn checked(mut self) -> Result<Self, ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2 (got {})",
                self.temperature
            )));
        }
        if self.retry.max_retries > MAX_RETRIES {
            tracing::warn!(
                configured = self.retry.max_retries,
                max = MAX_RETRIES,
                "Clamping retry.max_retries"
            );
            self.retry.max_retries = MAX_RETRIES;
        }
        Ok(self)
    }

    /// Per-call settings for a flow: the flow's generation section wins over
    /// the runtime defaults.
    pub fn completion_config(&self, generation: &GenerationSpec) -> CompletionConfig {
        CompletionConfig {
            model: generation
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            max_tokens: generation.max_tokens.unwrap_or(self.max_tokens),
            temperature: generation.temperature.unwrap_or(self.temperature),
            timeout: self.timeout,
        }
    }

    /// Build the configured provider.
    pub fn build_provider(
        &self,
        registry: &ProviderRegistry,
    ) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        registry.validate(&self.provider, &self.provider_config)?;
        registry.create(&self.provider, &self.provider_config)
    }
}
