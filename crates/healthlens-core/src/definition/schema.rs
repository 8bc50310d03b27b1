//! JSON Schema validation for flow definition documents.
//!
//! Every document must validate against `schema/flow.schema.json` before it
//! is deserialized and compiled.

use std::sync::OnceLock;

use serde_json::Value;

/// Embedded flow schema (loaded at compile time).
const FLOW_SCHEMA_JSON: &str = include_str!("../../../../schema/flow.schema.json");

/// Compiled validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema: Value = serde_json::from_str(FLOW_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;
        jsonschema::options()
            .build(&schema)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a definition document, collecting every schema error.
pub fn validate_document(document: &Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| {
            let location = e.instance_path.to_string();
            if location.is_empty() {
                e.to_string()
            } else {
                format!("{} at {}", e, location)
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "name": "summarize_entry",
            "input": [{"name": "entry", "type": "string"}],
            "output": [{"name": "summary", "type": "string"}],
            "prompt": "Summarize: {{entry}}"
        })
    }

    #[test]
    fn test_minimal_document_passes() {
        assert!(validate_document(&minimal()).is_ok());
    }

    #[test]
    fn test_missing_prompt_fails() {
        let mut document = minimal();
        document.as_object_mut().unwrap().remove("prompt");
        assert!(validate_document(&document).is_err());
    }

    #[test]
    fn test_unknown_top_level_key_fails() {
        let mut document = minimal();
        document["retries"] = json!(3);
        assert!(validate_document(&document).is_err());
    }

    #[test]
    fn test_enum_without_values_fails() {
        let mut document = minimal();
        document["input"] = json!([{"name": "language", "type": "enum"}]);
        assert!(validate_document(&document).is_err());
    }

    #[test]
    fn test_unknown_rule_fails() {
        let mut document = minimal();
        document["rules"] = json!([{"rule": "translate", "field": "summary"}]);
        assert!(validate_document(&document).is_err());
    }

    #[test]
    fn test_nested_contracts_validated() {
        let mut document = minimal();
        document["output"] = json!([{
            "name": "days",
            "type": "array",
            "items": {
                "type": "object",
                "fields": [{"name": "meals", "type": "array", "items": {"type": "strin"}}]
            }
        }]);
        let errors = validate_document(&document).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_full_generation_section_passes() {
        let mut document = minimal();
        document["generation"] = json!({
            "model": "gemini-2.0-flash",
            "temperature": 0.4,
            "max_tokens": 2048,
            "modalities": ["text", "image"],
            "output": {"kind": "media", "field": "summary"}
        });
        assert!(validate_document(&document).is_ok());

        document["generation"]["output"] = json!({"kind": "text"});
        assert!(validate_document(&document).is_err());
    }
}
