//! Model Endpoint abstractions.
//!
//! A provider turns a rendered prompt (plus optional system instruction and
//! structured-output schema) into generated text and media. The runner
//! receives its provider explicitly; nothing here is global.
//!
//! ## Security
//!
//! All hosted providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use std::time::Duration;

use async_trait::async_trait;
use healthlens_core::Modality;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

mod factory;
pub mod secrets;
mod stub;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "gemini")]
mod gemini;

pub use crate::error::ProviderError;
pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};
pub use stub::{StubProvider, StubProviderFactory, StubReply};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiProvider, GeminiProviderFactory};

/// Configuration for a single generation request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    pub temperature: f32,

    /// Request timeout enforced by the HTTP client
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

/// What the runner sends to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub prompt: String,

    pub modalities: Vec<Modality>,

    /// JSON Schema the response text must follow, for structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<JsonValue>,
}

impl ModelRequest {
    /// A plain text request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            modalities: vec![Modality::Text],
            response_schema: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = modalities;
        self
    }

    pub fn wants(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }
}

/// A generated media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// MIME type, e.g. `image/png`
    pub content_type: String,

    /// Reference to the content, usually a `data:` URI
    pub url: String,
}

impl Media {
    /// Wrap base64 content in a data URI.
    pub fn inline(content_type: impl Into<String>, base64: &str) -> Self {
        let content_type = content_type.into();
        let url = format!("data:{};base64,{}", content_type, base64);
        Self { content_type, url }
    }
}

/// What a provider returns.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    /// Concatenated text parts, if any
    pub text: Option<String>,

    /// Generated media, in response order
    pub media: Vec<Media>,

    pub usage: TokenUsage,

    /// Model that served the request
    pub model: String,

    pub stop_reason: Option<String>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn first_media(&self) -> Option<&Media> {
        self.media.first()
    }
}

/// Token usage reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A Model Endpoint.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate content for one request.
    async fn generate(
        &self,
        request: &ModelRequest,
        config: &CompletionConfig,
    ) -> Result<ModelResponse, ProviderError>;

    /// Check if the provider can serve requests.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Rough token estimate for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // ~4 chars per token
        (text.len() / 4) as u32
    }
}

/// Append the schema to a system instruction for endpoints without native
/// structured output.
#[cfg_attr(not(feature = "anthropic"), allow(dead_code))]
pub(crate) fn schema_instruction(system: Option<&str>, schema: &JsonValue) -> String {
    let mut instruction = String::new();
    if let Some(system) = system {
        instruction.push_str(system.trim_end());
        instruction.push_str("\n\n");
    }
    instruction.push_str(
        "Respond with a single JSON object and nothing else. It must conform to this JSON Schema:\n",
    );
    instruction.push_str(&schema.to_string());
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builders() {
        let request = ModelRequest::text("Hello")
            .with_system("Be kind.")
            .with_schema(json!({"type": "object"}))
            .with_modalities(vec![Modality::Text, Modality::Image]);
        assert_eq!(request.system.as_deref(), Some("Be kind."));
        assert!(request.wants(Modality::Image));
        assert!(request.response_schema.is_some());
    }

    #[test]
    fn test_media_inline_data_uri() {
        let media = Media::inline("image/png", "iVBORw0KGgo=");
        assert_eq!(media.url, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(media.content_type, "image/png");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_schema_instruction() {
        let instruction =
            schema_instruction(Some("You are helpful.\n"), &json!({"type": "object"}));
        assert!(instruction.starts_with("You are helpful.\n\nRespond with a single JSON object"));
        assert!(instruction.ends_with(r#"{"type":"object"}"#));
    }
}
