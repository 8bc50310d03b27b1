//! Google Gemini provider (Generative Language `generateContent`).
//!
//! Structured output uses `responseMimeType: application/json` with a
//! `responseSchema`; image output uses `responseModalities`. Inline image
//! data in the response becomes a `data:` URI.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use healthlens_core::Modality;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    CompletionConfig, Media, ModelProvider, ModelRequest, ModelResponse, ProviderError,
    TokenUsage,
};

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords understood by `responseSchema`.
const SCHEMA_KEYWORDS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
];

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Gemini API key",
        ))
    }

    /// Create from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GEMINI_API_KEY_ENV, "Gemini API key")?;
        Ok(Self::with_credential(credential))
    }

    /// Create from JSON configuration with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GEMINI_API_KEY_ENV,
            "Gemini API key",
        )?;
        let provider = Self::with_credential(credential);

        Ok(match config["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

impl GeminiRequest {
    fn build(request: &ModelRequest, config: &CompletionConfig) -> Self {
        let text_part = |text: &str| Part {
            text: Some(text.to_string()),
            inline_data: None,
        };

        let wants_image = request.wants(Modality::Image);
        let response_modalities = wants_image.then(|| {
            request
                .modalities
                .iter()
                .map(|m| match m {
                    Modality::Text => "TEXT",
                    Modality::Image => "IMAGE",
                })
                .collect()
        });
        // JSON mode is only available for text-only responses.
        let response_schema = request
            .response_schema
            .as_ref()
            .filter(|_| !wants_image)
            .map(to_gemini_schema);

        Self {
            system_instruction: request.system.as_deref().map(|system| Content {
                role: None,
                parts: vec![text_part(system)],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![text_part(&request.prompt)],
            }],
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
                response_mime_type: response_schema.as_ref().map(|_| "application/json"),
                response_schema,
                response_modalities,
            },
        }
    }
}

impl GeminiResponse {
    fn into_model_response(self, requested_model: &str) -> ModelResponse {
        let usage = self
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = self.candidates.into_iter().next() else {
            return ModelResponse {
                usage,
                model: self.model_version.unwrap_or_else(|| requested_model.to_string()),
                ..ModelResponse::default()
            };
        };

        let mut text = String::new();
        let mut media = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(inline) = part.inline_data {
                media.push(Media::inline(inline.mime_type, &inline.data));
            }
        }

        ModelResponse {
            text: Some(text).filter(|t| !t.trim().is_empty()),
            media,
            usage,
            model: self.model_version.unwrap_or_else(|| requested_model.to_string()),
            stop_reason: candidate.finish_reason,
        }
    }
}

/// Reduce a JSON Schema to the subset `responseSchema` accepts, with
/// upper-case type names.
fn to_gemini_schema(schema: &JsonValue) -> JsonValue {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in object {
        if !SCHEMA_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let converted = match key.as_str() {
            "type" => value
                .as_str()
                .map(|t| JsonValue::String(t.to_uppercase()))
                .unwrap_or_else(|| value.clone()),
            "properties" => JsonValue::Object(
                value
                    .as_object()
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            "items" => to_gemini_schema(value),
            _ => value.clone(),
        };
        out.insert(key.clone(), converted);
    }
    // Gemini models enums as strings with an enum format.
    if out.contains_key("enum") {
        out.insert("type".to_string(), JsonValue::String("STRING".to_string()));
        out.insert("format".to_string(), JsonValue::String("enum".to_string()));
    }
    JsonValue::Object(out)
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate(
        &self,
        request: &ModelRequest,
        config: &CompletionConfig,
    ) -> Result<ModelResponse, ProviderError> {
        let body = GeminiRequest::build(request, config);

        // Expose the credential only here, at the point of use
        let response = self
            .client
            .post(self.endpoint(&config.model))
            .header("x-goog-api-key", self.credential.expose())
            .timeout(config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = response
                .json::<GeminiError>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|e| format!("unreadable error body: {}", e));
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into_model_response(&config.model))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for Gemini providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "AIza...",      // Optional, falls back to GEMINI_API_KEY env
///   "base_url": "https://..."  // Optional, custom API endpoint
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn ModelProvider>, ProviderError> {
        Ok(Arc::new(GeminiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Gemini API key required: set 'api_key' in config or {} env",
                GEMINI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "model": "gemini-2.0-flash" })
    }

    fn description(&self) -> &'static str {
        "Google Gemini provider with structured output and image generation"
    }
}
