//! API keys for hosted providers.
//!
//! A key can come from provider config, from an `env:NAME` reference in
//! provider config, or from the provider's default environment variable, in
//! that order. Keys are held as [`SecretString`], print as `[REDACTED]`, and
//! are only exposed while a request header is built.
//!
//! ```yaml
//! provider: gemini
//! provider_config:
//!   api_key: env:HEALTHLENS_GEMINI_KEY
//! ```

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;

use super::ProviderError;

/// Prefix marking a config value as an environment variable reference.
const ENV_REFERENCE: &str = "env:";

/// Where a key was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Literal value in provider config
    Config,
    /// Environment variable, named by config or by the provider default
    Environment(String),
    /// Passed in code
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment(var) => write!(f, "${}", var),
            CredentialSource::Programmatic => write!(f, "code"),
        }
    }
}

/// A provider API key.
pub struct ApiCredential {
    key: SecretString,
    source: CredentialSource,
    label: &'static str,
}

impl ApiCredential {
    pub fn new(key: impl Into<String>, source: CredentialSource, label: &'static str) -> Self {
        Self {
            key: SecretString::from(key.into()),
            source,
            label,
        }
    }

    /// Read a key from an environment variable. Blank values count as unset.
    pub fn from_env(var: &str, label: &'static str) -> Result<Self, ProviderError> {
        read_env(var)
            .map(|key| Self::new(key, CredentialSource::Environment(var.to_string()), label))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} missing: set the {} environment variable",
                    label, var
                ))
            })
    }

    /// Resolve a key from `config[field]` (a literal or `env:NAME`), falling
    /// back to `default_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        field: &str,
        default_var: &str,
        label: &'static str,
    ) -> Result<Self, ProviderError> {
        match config[field].as_str().map(str::trim) {
            Some(reference) if reference.starts_with(ENV_REFERENCE) => {
                let var = reference[ENV_REFERENCE.len()..].trim();
                Self::from_env(var, label)
            }
            Some(literal) if !literal.is_empty() => {
                Ok(Self::new(literal, CredentialSource::Config, label))
            }
            _ => Self::from_env(default_var, label).map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} missing: set '{}' in provider_config or the {} environment variable",
                    label, field, default_var
                ))
            }),
        }
    }

    /// Whether [`ApiCredential::from_config_or_env`] would succeed.
    pub fn is_available(config: &JsonValue, field: &str, default_var: &str) -> bool {
        Self::from_config_or_env(config, field, default_var, "key").is_ok()
    }

    /// The raw key, for building a request header.
    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.key.expose_secret().is_empty()
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

fn read_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [REDACTED]", self.label, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_never_printed() {
        let key = "AIza-do-not-print-me";
        let credential = ApiCredential::new(key, CredentialSource::Config, "Gemini API key");

        assert!(!format!("{:?}", credential).contains(key));
        assert!(!credential.to_string().contains(key));
        assert_eq!(credential.to_string(), "Gemini API key (config) [REDACTED]");
        assert_eq!(credential.expose(), key);
    }

    #[test]
    fn test_literal_config_wins_over_default_var() {
        std::env::set_var("HEALTHLENS_TEST_DEFAULT_A", "from-env");
        let credential = ApiCredential::from_config_or_env(
            &json!({"api_key": "from-config"}),
            "api_key",
            "HEALTHLENS_TEST_DEFAULT_A",
            "key",
        )
        .unwrap();
        assert_eq!(credential.expose(), "from-config");
        assert_eq!(credential.source(), &CredentialSource::Config);
        std::env::remove_var("HEALTHLENS_TEST_DEFAULT_A");
    }

    #[test]
    fn test_env_reference_in_config() {
        std::env::set_var("HEALTHLENS_TEST_REFERENCED", "referenced-key");
        let credential = ApiCredential::from_config_or_env(
            &json!({"api_key": "env:HEALTHLENS_TEST_REFERENCED"}),
            "api_key",
            "HEALTHLENS_TEST_UNUSED_DEFAULT",
            "key",
        )
        .unwrap();
        assert_eq!(credential.expose(), "referenced-key");
        assert_eq!(
            credential.source(),
            &CredentialSource::Environment("HEALTHLENS_TEST_REFERENCED".to_string())
        );
        std::env::remove_var("HEALTHLENS_TEST_REFERENCED");
    }

    #[test]
    fn test_default_var_fallback_and_blank_values() {
        std::env::set_var("HEALTHLENS_TEST_DEFAULT_B", "default-key");
        let credential = ApiCredential::from_config_or_env(
            &json!({"api_key": "  "}),
            "api_key",
            "HEALTHLENS_TEST_DEFAULT_B",
            "key",
        )
        .unwrap();
        assert_eq!(credential.expose(), "default-key");

        std::env::set_var("HEALTHLENS_TEST_DEFAULT_B", " ");
        assert!(!ApiCredential::is_available(&json!({}), "api_key", "HEALTHLENS_TEST_DEFAULT_B"));
        std::env::remove_var("HEALTHLENS_TEST_DEFAULT_B");
    }

    #[test]
    fn test_missing_key_message_names_both_places() {
        let message = ApiCredential::from_config_or_env(
            &json!({}),
            "api_key",
            "HEALTHLENS_TEST_NEVER_SET",
            "Gemini API key",
        )
        .unwrap_err()
        .to_string();
        assert!(message.contains("'api_key'"));
        assert!(message.contains("HEALTHLENS_TEST_NEVER_SET"));
    }
}
