//! Scripted provider for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use super::{
    factory::ProviderFactory, CompletionConfig, Media, ModelProvider, ModelRequest, ModelResponse,
    ProviderError, TokenUsage,
};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Plain response text
    Text(String),

    /// A JSON document, sent as compact text
    Json(JsonValue),

    /// Generated media with optional text
    Media {
        text: Option<String>,
        media: Vec<Media>,
    },

    /// A response with no content at all
    Empty,

    /// A provider failure
    Fail(ProviderError),
}

/// Provider that answers from a script and records every request.
///
/// Scripted replies are used in order; once the script is exhausted the
/// default reply (if any) answers every further call.
#[derive(Debug, Default)]
pub struct StubProvider {
    script: Mutex<VecDeque<StubReply>>,
    default_reply: Option<StubReply>,
    delay: Duration,
    calls: Mutex<Vec<ModelRequest>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call with the same reply.
    pub fn replying(reply: StubReply) -> Self {
        Self {
            default_reply: Some(reply),
            ..Self::default()
        }
    }

    /// Answer every call with a JSON document.
    pub fn replying_json(value: JsonValue) -> Self {
        Self::replying(StubReply::Json(value))
    }

    /// Queue a reply ahead of the default one.
    pub fn then(self, reply: StubReply) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    /// Wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<ModelRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next_reply(&self) -> Option<StubReply> {
        self.script
            .lock()
            .pop_front()
            .or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl ModelProvider for StubProvider {
    async fn generate(
        &self,
        request: &ModelRequest,
        config: &CompletionConfig,
    ) -> Result<ModelResponse, ProviderError> {
        self.calls.lock().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.next_reply().ok_or_else(|| {
            ProviderError::NotConfigured("stub provider has no reply scripted".to_string())
        })?;

        let usage = TokenUsage {
            prompt_tokens: self.estimate_tokens(&request.prompt),
            completion_tokens: 0,
        };
        let response = ModelResponse {
            usage,
            model: config.model.clone(),
            stop_reason: Some("stop".to_string()),
            ..ModelResponse::default()
        };

        match reply {
            StubReply::Text(text) => Ok(ModelResponse {
                text: Some(text),
                ..response
            }),
            StubReply::Json(value) => Ok(ModelResponse {
                text: Some(value.to_string()),
                ..response
            }),
            StubReply::Media { text, media } => Ok(ModelResponse {
                text,
                media,
                ..response
            }),
            StubReply::Empty => Ok(response),
            StubReply::Fail(error) => Err(error),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Factory for stub providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "reply": {"summary": "..."},   // JSON reply for every call
///   "text": "...",                 // or a plain text reply
///   "delay_ms": 0                  // optional artificial latency
/// }
/// ```
pub struct StubProviderFactory;

impl ProviderFactory for StubProviderFactory {
    fn provider_type(&self) -> &'static str {
        "stub"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        self.validate_config(config)?;

        let provider = match (config.get("reply"), config["text"].as_str()) {
            (Some(reply), _) => StubProvider::replying_json(reply.clone()),
            (None, Some(text)) => StubProvider::replying(StubReply::Text(text.to_string())),
            (None, None) => StubProvider::replying(StubReply::Empty),
        };
        let delay = Duration::from_millis(config["delay_ms"].as_u64().unwrap_or(0));

        Ok(Arc::new(provider.with_delay(delay)))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !config["text"].is_null() && !config["text"].is_string() {
            return Err(ProviderError::NotConfigured(
                "stub 'text' must be a string".to_string(),
            ));
        }
        if !config["delay_ms"].is_null() && !config["delay_ms"].is_u64() {
            return Err(ProviderError::NotConfigured(
                "stub 'delay_ms' must be a non-negative integer".to_string(),
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Scripted provider for tests and offline runs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_then_default() {
        let provider = StubProvider::replying(StubReply::Text("default".into()))
            .then(StubReply::Fail(ProviderError::AuthError))
            .then(StubReply::Json(json!({"a": 1})));
        let config = CompletionConfig::default();
        let request = ModelRequest::text("hi");

        assert_eq!(
            provider.generate(&request, &config).await.unwrap_err(),
            ProviderError::AuthError
        );
        assert_eq!(
            provider.generate(&request, &config).await.unwrap().text.as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert_eq!(
            provider.generate(&request, &config).await.unwrap().text.as_deref(),
            Some("default")
        );
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.calls()[0].prompt, "hi");
    }

    #[tokio::test]
    async fn test_unscripted_stub_fails() {
        let provider = StubProvider::new();
        let result = provider
            .generate(&ModelRequest::text("hi"), &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_factory_creates_json_stub() {
        let provider = StubProviderFactory
            .create(&json!({"reply": {"summary": "ok"}}))
            .unwrap();
        assert_eq!(provider.name(), "stub");
        let response = provider
            .generate(&ModelRequest::text("x"), &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(response.text.as_deref(), Some(r#"{"summary":"ok"}"#));
    }

    #[test]
    fn test_factory_validation() {
        assert!(StubProviderFactory.validate_config(&json!({"text": 5})).is_err());
        assert!(StubProviderFactory.validate_config(&json!({"delay_ms": -1})).is_err());
        assert!(StubProviderFactory.validate_config(&json!({})).is_ok());
    }
}
