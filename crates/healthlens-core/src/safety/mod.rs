//! Crisis override.
//!
//! A flow may declare a `safety` section. When any scanned input text
//! contains a high-risk phrase, the flow returns a fixed, pre-approved
//! fallback (selected by the request language) instead of model output.

mod keywords;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use keywords::{KeywordMatcher, DEFAULT_KEYWORDS};

use crate::contract::{Contract, FieldType, Record};
use crate::path::FieldPath;

/// When the guard runs relative to the model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    /// Short-circuit before the model is called
    #[default]
    PreCall,

    /// Call the model, then discard its output on a match
    PostCall,
}

fn default_language() -> String {
    "en".to_string()
}

/// The `safety` section of a flow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySpec {
    /// Input paths whose string leaves are scanned
    pub scan: Vec<FieldPath>,

    /// Phrase list; the built-in list when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(default)]
    pub mode: SafetyMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_field: Option<FieldPath>,

    #[serde(default = "default_language")]
    pub default_language: String,

    /// Fallback output per language
    pub fallback: BTreeMap<String, Value>,
}

/// A detected high-risk phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyMatch {
    pub keyword: String,

    /// Where it was found, e.g. `healthGoals[1]`
    pub field: String,
}

/// A compiled safety section.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    spec: SafetySpec,
    matcher: KeywordMatcher,
}

impl SafetyGuard {
    pub fn new(spec: SafetySpec) -> Result<Self, regex::Error> {
        let matcher = match &spec.keywords {
            Some(keywords) => KeywordMatcher::new(keywords)?,
            None => KeywordMatcher::builtin().clone(),
        };
        Ok(Self { spec, matcher })
    }

    pub fn spec(&self) -> &SafetySpec {
        &self.spec
    }

    pub fn mode(&self) -> SafetyMode {
        self.spec.mode
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    /// Scan the validated request; the first match in declaration order wins.
    pub fn screen(&self, input: &Record) -> Option<SafetyMatch> {
        self.spec.scan.iter().find_map(|path| {
            let value = path.lookup(input)?;
            self.scan_value(value, path.to_string())
        })
    }

    fn scan_value(&self, value: &Value, location: String) -> Option<SafetyMatch> {
        match value {
            Value::String(text) => self.matcher.find(text).map(|keyword| SafetyMatch {
                keyword,
                field: location,
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| self.scan_value(item, format!("{}[{}]", location, i))),
            Value::Object(members) => members
                .iter()
                .find_map(|(key, member)| self.scan_value(member, format!("{}.{}", location, key))),
            _ => None,
        }
    }

    /// Language used for the fallback: the request language when a fallback
    /// exists for it, otherwise the default language.
    pub fn language_for(&self, input: &Record) -> &str {
        self.spec
            .language_field
            .as_ref()
            .and_then(|path| path.lookup(input))
            .and_then(Value::as_str)
            .and_then(|language| {
                self.spec
                    .fallback
                    .get_key_value(language)
                    .map(|(k, _)| k.as_str())
            })
            .unwrap_or(&self.spec.default_language)
    }

    /// The raw fallback value for the request language.
    pub fn fallback_for(&self, input: &Record) -> Option<(&str, &Value)> {
        let language = self.language_for(input);
        self.spec
            .fallback
            .get(language)
            .map(|value| (language, value))
    }

    /// Configuration problems against the flow's contracts.
    pub fn problems(&self, input: &Contract, output: &Contract) -> Vec<String> {
        let mut problems = Vec::new();

        if self.spec.scan.is_empty() {
            problems.push("safety: scan lists no input fields".to_string());
        }
        for path in &self.spec.scan {
            match input.resolve(path) {
                Some(field) if scannable(&field.ty) => {}
                Some(field) => problems.push(format!(
                    "safety: '{}' is a {} and holds no text",
                    path,
                    field.ty.type_name()
                )),
                None => problems.push(format!("safety: no input field '{}'", path)),
            }
        }

        if self.matcher.keywords().is_empty() {
            problems.push("safety: keyword list is empty".to_string());
        }

        if let Some(path) = &self.spec.language_field {
            match input.resolve(path) {
                Some(field) if field.ty.is_textual() => {}
                Some(_) => problems.push(format!(
                    "safety: language field '{}' is not a string",
                    path
                )),
                None => problems.push(format!("safety: no input field '{}'", path)),
            }
        }

        if !self.spec.fallback.contains_key(&self.spec.default_language) {
            problems.push(format!(
                "safety: no fallback for default language '{}'",
                self.spec.default_language
            ));
        }
        for (language, value) in &self.spec.fallback {
            if let Err(violations) = output.validate(value) {
                for violation in violations {
                    problems.push(format!(
                        "safety: '{}' fallback is invalid: {}",
                        language, violation
                    ));
                }
            }
        }

        problems
    }
}

fn scannable(ty: &FieldType) -> bool {
    match ty {
        FieldType::String { .. } | FieldType::Enum { .. } => true,
        FieldType::Array { items, .. } => scannable(items),
        FieldType::Object { fields } => fields.iter().any(|f| scannable(&f.ty)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;
    use serde_json::json;

    fn spec() -> SafetySpec {
        serde_yaml::from_str(
            r#"
scan: [entry, goals]
language_field: language
fallback:
  en: {message: "Please reach out to a healthcare professional."}
  es: {message: "Por favor, contacta a un profesional de la salud."}
"#,
        )
        .unwrap()
    }

    fn input(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_defaults() {
        let spec = spec();
        assert_eq!(spec.mode, SafetyMode::PreCall);
        assert_eq!(spec.default_language, "en");
        assert!(spec.keywords.is_none());
    }

    #[test]
    fn test_screen_reports_location() {
        let guard = SafetyGuard::new(spec()).unwrap();
        let found = guard
            .screen(&input(json!({
                "entry": "fine today",
                "goals": ["sleep", "stop binge eating"]
            })))
            .unwrap();
        assert_eq!(found.keyword, "binge eating");
        assert_eq!(found.field, "goals[1]");

        assert!(guard
            .screen(&input(json!({"entry": "a calm walk", "goals": []})))
            .is_none());
    }

    #[test]
    fn test_unscanned_fields_ignored() {
        let guard = SafetyGuard::new(spec()).unwrap();
        assert!(guard
            .screen(&input(json!({"notes": "suicidal thoughts"})))
            .is_none());
    }

    #[test]
    fn test_fallback_language_selection() {
        let guard = SafetyGuard::new(spec()).unwrap();
        let (language, value) = guard.fallback_for(&input(json!({"language": "es"}))).unwrap();
        assert_eq!(language, "es");
        assert!(value["message"].as_str().unwrap().starts_with("Por favor"));

        let (language, _) = guard.fallback_for(&input(json!({"language": "fr"}))).unwrap();
        assert_eq!(language, "en");
        let (language, _) = guard.fallback_for(&input(json!({}))).unwrap();
        assert_eq!(language, "en");
    }

    #[test]
    fn test_custom_keywords() {
        let mut spec = spec();
        spec.keywords = Some(vec!["red flag".to_string()]);
        let guard = SafetyGuard::new(spec).unwrap();
        assert!(guard.screen(&input(json!({"entry": "RED FLAG"}))).is_some());
        assert!(guard.screen(&input(json!({"entry": "suicide"}))).is_none());
    }

    #[test]
    fn test_problems() {
        let input_contract = Contract::new(vec![
            FieldSpec::required("entry", FieldType::string()),
            FieldSpec::optional("goals", FieldType::array_of(FieldType::string())),
            FieldSpec::optional("language", FieldType::one_of(["en", "es"])),
        ]);
        let output_contract =
            Contract::new(vec![FieldSpec::required("message", FieldType::string())]);
        let guard = SafetyGuard::new(spec()).unwrap();
        assert!(guard.problems(&input_contract, &output_contract).is_empty());

        let mut bad = spec();
        bad.scan.push(FieldPath::parse("age").unwrap());
        bad.default_language = "de".to_string();
        bad.fallback.insert("fr".to_string(), json!({"msg": 1}));
        let problems = SafetyGuard::new(bad)
            .unwrap()
            .problems(&input_contract, &output_contract);
        assert!(problems.iter().any(|p| p.contains("no input field 'age'")));
        assert!(problems.iter().any(|p| p.contains("default language 'de'")));
        assert!(problems.iter().any(|p| p.contains("'fr' fallback is invalid")));
    }
}
