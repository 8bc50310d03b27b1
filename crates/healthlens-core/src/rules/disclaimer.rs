//! Disclaimer guarantee for health-guidance fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{Contract, FieldType, Record};
use crate::path::FieldPath;

/// Phrases that count as an existing disclaimer when no markers are declared.
pub const DEFAULT_MARKERS: &[&str] = &[
    "disclaimer",
    "consult",
    "healthcare professional",
    "medical advice",
    "not a substitute",
    "profesional de la salud",
    "consulte",
];

fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
}

/// Append a disclaimer to a string field unless one is already present.
///
/// Every candidate text must itself contain a marker, so applying the rule
/// to its own output changes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureDisclaimer {
    /// Output field carrying health guidance
    pub field: FieldPath,

    /// Disclaimer appended when none is found
    pub text: String,

    /// Case-insensitive phrases that count as an existing disclaimer
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,

    /// Localized disclaimer texts keyed by language code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, String>,

    /// Input field holding the language code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_field: Option<FieldPath>,
}

impl EnsureDisclaimer {
    /// Whether the text already carries one of the markers.
    pub fn has_marker(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
    }

    /// Disclaimer text for the request's language.
    pub fn text_for(&self, input: &Record) -> &str {
        self.language_field
            .as_ref()
            .and_then(|path| path.lookup(input))
            .and_then(Value::as_str)
            .and_then(|language| self.translations.get(language))
            .map(String::as_str)
            .unwrap_or(&self.text)
    }

    pub(crate) fn apply(&self, input: &Record, output: &mut Record) -> bool {
        let disclaimer = self.text_for(input).to_string();

        if let Some(Value::String(existing)) = self.field.lookup_mut(output) {
            if existing.trim().is_empty() {
                *existing = disclaimer;
                return true;
            }
            if self.has_marker(existing) {
                return false;
            }
            existing.push_str("\n\n");
            existing.push_str(&disclaimer);
            return true;
        }

        let absent = matches!(self.field.lookup(output), Some(Value::Null) | None);
        absent && self.field.set(output, Value::String(disclaimer))
    }

    pub(crate) fn problems(&self, input: &Contract, output: &Contract) -> Vec<String> {
        let mut problems = Vec::new();

        match output.resolve(&self.field).map(|f| &f.ty) {
            Some(FieldType::String {
                max_length: None,
                pattern: None,
                ..
            }) => {}
            Some(FieldType::String { .. }) => problems.push(format!(
                "ensure_disclaimer: '{}' must not declare max_length or pattern",
                self.field
            )),
            Some(other) => problems.push(format!(
                "ensure_disclaimer: '{}' is a {}, expected string",
                self.field,
                other.type_name()
            )),
            None => problems.push(format!(
                "ensure_disclaimer: no output field '{}'",
                self.field
            )),
        }

        if self.markers.iter().all(|m| m.trim().is_empty()) {
            problems.push("ensure_disclaimer: markers must not be empty".to_string());
        }

        for text in std::iter::once(&self.text).chain(self.translations.values()) {
            if !self.has_marker(text) {
                problems.push(format!(
                    "ensure_disclaimer: disclaimer text '{}' contains none of its markers",
                    text
                ));
            }
        }

        if let Some(path) = &self.language_field {
            match input.resolve(path) {
                Some(field) if field.ty.is_textual() => {}
                Some(_) => problems.push(format!(
                    "ensure_disclaimer: language field '{}' is not a string",
                    path
                )),
                None => problems.push(format!(
                    "ensure_disclaimer: no input field '{}'",
                    path
                )),
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;
    use serde_json::json;

    fn rule() -> EnsureDisclaimer {
        EnsureDisclaimer {
            field: FieldPath::parse("advice").unwrap(),
            text: "Please consult a healthcare professional.".to_string(),
            markers: default_markers(),
            translations: BTreeMap::from([(
                "es".to_string(),
                "Consulte a un profesional de la salud.".to_string(),
            )]),
            language_field: Some(FieldPath::parse("language").unwrap()),
        }
    }

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_appends_when_missing_marker() {
        let input = record(json!({"language": "en"}));
        let mut output = record(json!({"advice": "Drink water."}));
        assert!(rule().apply(&input, &mut output));
        assert_eq!(
            output["advice"],
            "Drink water.\n\nPlease consult a healthcare professional."
        );
    }

    #[test]
    fn test_idempotent() {
        let input = record(json!({"language": "en"}));
        let mut output = record(json!({"advice": "Drink water."}));
        rule().apply(&input, &mut output);
        let once = output.clone();
        assert!(!rule().apply(&input, &mut output));
        assert_eq!(output, once);
    }

    #[test]
    fn test_existing_disclaimer_untouched() {
        let input = record(json!({}));
        let mut output = record(json!({"advice": "This is not MEDICAL ADVICE."}));
        assert!(!rule().apply(&input, &mut output));
        assert_eq!(output["advice"], "This is not MEDICAL ADVICE.");
    }

    #[test]
    fn test_fills_absent_and_blank_field_in_language() {
        let input = record(json!({"language": "es"}));
        let mut output = record(json!({}));
        assert!(rule().apply(&input, &mut output));
        assert_eq!(output["advice"], "Consulte a un profesional de la salud.");

        let mut blank = record(json!({"advice": "  "}));
        assert!(rule().apply(&input, &mut blank));
        assert_eq!(blank["advice"], "Consulte a un profesional de la salud.");
    }

    #[test]
    fn test_unknown_language_uses_default_text() {
        let input = record(json!({"language": "fr"}));
        assert_eq!(
            rule().text_for(&input),
            "Please consult a healthcare professional."
        );
    }

    #[test]
    fn test_problems() {
        let input = Contract::new(vec![FieldSpec::required("language", FieldType::string())]);
        let output = Contract::new(vec![FieldSpec::required("advice", FieldType::string())]);
        assert!(rule().problems(&input, &output).is_empty());

        let mut bad = rule();
        bad.text = "Stay safe.".to_string();
        bad.field = FieldPath::parse("missing").unwrap();
        let problems = bad.problems(&input, &output);
        assert_eq!(problems.len(), 2);
    }
}
