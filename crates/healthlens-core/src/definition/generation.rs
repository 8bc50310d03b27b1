//! Model parameters and the mapping from a model response to a payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::contract::{Contract, FieldType};
use crate::path::FieldPath;

/// Kind of content a flow asks the model to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
}

fn default_modalities() -> Vec<Modality> {
    vec![Modality::Text]
}

/// How the model response becomes the output payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputMapping {
    /// The response text is a JSON document
    #[default]
    Json,

    /// The raw response text is stored in one field
    Text { field: FieldPath },

    /// The first generated media reference is stored in one field
    Media {
        field: FieldPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption_field: Option<FieldPath>,
    },
}

/// The `generation` section of a flow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSpec {
    /// Overrides the runtime's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_modalities")]
    pub modalities: Vec<Modality>,

    #[serde(default)]
    pub output: OutputMapping,
}

impl Default for GenerationSpec {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            modalities: default_modalities(),
            output: OutputMapping::Json,
        }
    }
}

/// Why a model response yielded no payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Model returned no usable content")]
    Empty,

    #[error("Model response is not valid JSON: {0}")]
    Malformed(String),
}

impl GenerationSpec {
    pub fn wants(&self, modality: Modality) -> bool {
        self.modalities.contains(&modality)
    }

    /// Whether the output contract should be sent as a structured-output schema.
    pub fn structured(&self) -> bool {
        self.output == OutputMapping::Json
    }

    /// Build the payload from the response text and first media reference.
    pub fn extract(&self, text: Option<&str>, media: Option<&str>) -> Result<Value, PayloadError> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());

        match &self.output {
            OutputMapping::Json => parse_json_payload(text.ok_or(PayloadError::Empty)?),
            OutputMapping::Text { field } => {
                let mut payload = Map::new();
                let text = text.ok_or(PayloadError::Empty)?;
                field.set(&mut payload, Value::String(text.to_string()));
                Ok(Value::Object(payload))
            }
            OutputMapping::Media {
                field,
                caption_field,
            } => {
                let uri = media
                    .filter(|m| !m.trim().is_empty())
                    .ok_or(PayloadError::Empty)?;
                let mut payload = Map::new();
                field.set(&mut payload, Value::String(uri.to_string()));
                if let (Some(caption_field), Some(caption)) = (caption_field, text) {
                    caption_field.set(&mut payload, Value::String(caption.to_string()));
                }
                Ok(Value::Object(payload))
            }
        }
    }

    pub(crate) fn problems(&self, output: &Contract) -> Vec<String> {
        let mut problems = Vec::new();

        if self.modalities.is_empty() {
            problems.push("generation: modalities must not be empty".to_string());
        }

        let mut require_string = |path: &FieldPath, role: &str| match output.resolve(path) {
            Some(field) if matches!(field.ty, FieldType::String { .. }) => {}
            Some(field) => problems.push(format!(
                "generation: {} '{}' is a {}, expected string",
                role,
                path,
                field.ty.type_name()
            )),
            None => problems.push(format!("generation: no output field '{}'", path)),
        };

        match &self.output {
            OutputMapping::Json => {}
            OutputMapping::Text { field } => require_string(field, "text field"),
            OutputMapping::Media {
                field,
                caption_field,
            } => {
                require_string(field, "media field");
                if let Some(caption_field) = caption_field {
                    require_string(caption_field, "caption field");
                }
            }
        }

        if matches!(self.output, OutputMapping::Media { .. }) && !self.wants(Modality::Image) {
            problems.push("generation: media output requires the image modality".to_string());
        }

        problems
    }
}

/// Parse model text as JSON, tolerating code fences and surrounding prose.
fn parse_json_payload(text: &str) -> Result<Value, PayloadError> {
    let unfenced = strip_code_fence(text);
    match serde_json::from_str(unfenced) {
        Ok(value) => Ok(value),
        Err(first) => outermost_object(unfenced)
            .and_then(|candidate| serde_json::from_str(candidate).ok())
            .ok_or_else(|| PayloadError::Malformed(first.to_string())),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) up to the first newline.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let spec: GenerationSpec = serde_yaml::from_str("temperature: 0.3").unwrap();
        assert_eq!(spec.modalities, vec![Modality::Text]);
        assert_eq!(spec.output, OutputMapping::Json);
        assert!(spec.structured());
    }

    #[test]
    fn test_json_payload() {
        let spec = GenerationSpec::default();
        assert_eq!(spec.extract(Some(r#"{"a": 1}"#), None).unwrap(), json!({"a": 1}));
        assert_eq!(
            spec.extract(Some("```json\n{\"a\": 2}\n```"), None).unwrap(),
            json!({"a": 2})
        );
        assert_eq!(
            spec.extract(Some("Here you go: {\"a\": 3} Enjoy!"), None)
                .unwrap(),
            json!({"a": 3})
        );
    }

    #[test]
    fn test_json_payload_empty_and_malformed() {
        let spec = GenerationSpec::default();
        assert_eq!(spec.extract(None, None), Err(PayloadError::Empty));
        assert_eq!(spec.extract(Some("   \n"), None), Err(PayloadError::Empty));
        assert!(matches!(
            spec.extract(Some("not json at all"), None),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn test_text_mapping() {
        let spec = GenerationSpec {
            output: OutputMapping::Text {
                field: FieldPath::parse("summary").unwrap(),
            },
            ..GenerationSpec::default()
        };
        assert_eq!(
            spec.extract(Some("  Rest well. "), None).unwrap(),
            json!({"summary": "Rest well."})
        );
        assert!(!spec.structured());
    }

    #[test]
    fn test_media_mapping() {
        let spec = GenerationSpec {
            modalities: vec![Modality::Text, Modality::Image],
            output: OutputMapping::Media {
                field: FieldPath::parse("imageUrl").unwrap(),
                caption_field: Some(FieldPath::parse("caption").unwrap()),
            },
            ..GenerationSpec::default()
        };
        assert_eq!(
            spec.extract(Some("A bowl of lentils"), Some("data:image/png;base64,AAAA"))
                .unwrap(),
            json!({"imageUrl": "data:image/png;base64,AAAA", "caption": "A bowl of lentils"})
        );
        assert_eq!(spec.extract(Some("only text"), None), Err(PayloadError::Empty));
    }

    #[test]
    fn test_problems() {
        let output = Contract::new(vec![
            FieldSpec::required("imageUrl", FieldType::string()),
            FieldSpec::optional("count", FieldType::integer()),
        ]);
        let spec = GenerationSpec {
            output: OutputMapping::Media {
                field: FieldPath::parse("imageUrl").unwrap(),
                caption_field: Some(FieldPath::parse("count").unwrap()),
            },
            ..GenerationSpec::default()
        };
        let problems = spec.problems(&output);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("caption field 'count'")));
        assert!(problems.iter().any(|p| p.contains("image modality")));
    }
}
