//! Flow definitions.
//!
//! A definition document is parsed from YAML or JSON, checked against the
//! flow schema, and compiled: templates are parsed and resolved against the
//! input contract, rules and the safety section are checked against both
//! contracts. A compiled [`FlowDefinition`] is immutable and can serve any
//! number of concurrent invocations.

mod document;
mod error;
mod generation;
mod schema;

use std::fs;
use std::path::Path;

use serde_json::Value;

pub use document::FlowDocument;
pub use error::DefinitionError;
pub use generation::{GenerationSpec, Modality, OutputMapping, PayloadError};
pub use schema::validate_document;

use crate::contract::{Contract, Record, Violation};
use crate::rules::{self, PostRule};
use crate::safety::{SafetyGuard, SafetyMatch};
use crate::template::Template;

/// A compiled flow definition.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    document: FlowDocument,
    system: Option<Template>,
    prompt: Template,
    safety: Option<SafetyGuard>,
    response_schema: Value,
}

impl FlowDefinition {
    /// Load a definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Load a definition from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load a definition file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Schema-check, deserialize and compile a document value.
    pub fn from_value(value: Value) -> Result<Self, DefinitionError> {
        validate_document(&value).map_err(DefinitionError::SchemaError)?;
        let document: FlowDocument = serde_json::from_value(value)?;
        Self::compile(document)
    }

    /// Compile a deserialized document, reporting every problem at once.
    pub fn compile(document: FlowDocument) -> Result<Self, DefinitionError> {
        let mut problems = Vec::new();

        problems.extend(document.input.problems().into_iter().map(|p| format!("input: {}", p)));
        problems.extend(document.output.problems().into_iter().map(|p| format!("output: {}", p)));

        let prompt = compile_template("prompt", &document.prompt, &document.input, &mut problems);
        let system = match &document.system {
            Some(source) => {
                compile_template("system", source, &document.input, &mut problems).map(Some)
            }
            None => Some(None),
        };

        problems.extend(document.generation.problems(&document.output));

        for (index, rule) in document.rules.iter().enumerate() {
            problems.extend(
                rule.problems(&document.input, &document.output)
                    .into_iter()
                    .map(|p| format!("rules[{}] {}", index, p)),
            );
        }

        let safety = match document.safety.clone() {
            Some(spec) => match SafetyGuard::new(spec) {
                Ok(guard) => {
                    problems.extend(guard.problems(&document.input, &document.output));
                    Some(Some(guard))
                }
                Err(e) => {
                    problems.push(format!("safety: keywords do not compile: {}", e));
                    None
                }
            },
            None => Some(None),
        };

        match (prompt, system, safety) {
            (Some(prompt), Some(system), Some(safety)) if problems.is_empty() => {
                let response_schema = document.output.to_json_schema();
                tracing::debug!(
                    flow = %document.name,
                    version = %document.version,
                    rules = document.rules.len(),
                    "Compiled flow definition"
                );
                Ok(Self {
                    document,
                    system,
                    prompt,
                    safety,
                    response_schema,
                })
            }
            _ => Err(DefinitionError::Invalid {
                flow: document.name,
                problems,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn version(&self) -> &str {
        &self.document.version
    }

    pub fn description(&self) -> Option<&str> {
        self.document.description.as_deref()
    }

    /// Whether transient failures may be retried automatically.
    pub fn idempotent(&self) -> bool {
        self.document.idempotent
    }

    pub fn input(&self) -> &Contract {
        &self.document.input
    }

    pub fn output(&self) -> &Contract {
        &self.document.output
    }

    pub fn generation(&self) -> &GenerationSpec {
        &self.document.generation
    }

    pub fn rules(&self) -> &[PostRule] {
        &self.document.rules
    }

    pub fn safety(&self) -> Option<&SafetyGuard> {
        self.safety.as_ref()
    }

    pub fn prompt(&self) -> &Template {
        &self.prompt
    }

    pub fn document(&self) -> &FlowDocument {
        &self.document
    }

    /// JSON Schema of the output contract, sent for structured output.
    pub fn response_schema(&self) -> &Value {
        &self.response_schema
    }

    /// Validate a raw request against the input contract.
    pub fn validate_input(&self, raw: &Value) -> Result<Record, Vec<Violation>> {
        self.document.input.validate(raw)
    }

    /// Look for crisis phrases in a validated request.
    pub fn screen(&self, input: &Record) -> Option<SafetyMatch> {
        self.safety.as_ref().and_then(|guard| guard.screen(input))
    }

    pub fn render_prompt(&self, input: &Record) -> String {
        self.prompt.render(input)
    }

    pub fn render_system(&self, input: &Record) -> Option<String> {
        self.system.as_ref().map(|t| t.render(input))
    }

    /// Turn model response content into an unvalidated payload.
    pub fn extract_payload(
        &self,
        text: Option<&str>,
        media: Option<&str>,
    ) -> Result<Value, PayloadError> {
        self.document.generation.extract(text, media)
    }

    /// Validate a model payload against the output contract.
    pub fn validate_output(&self, payload: &Value) -> Result<Record, Vec<Violation>> {
        self.document.output.validate(payload)
    }

    /// Apply the post-processing rules in order, then re-validate.
    pub fn post_process(
        &self,
        input: &Record,
        mut output: Record,
    ) -> Result<Record, Vec<Violation>> {
        rules::apply_all(&self.document.rules, input, &mut output);
        self.document.output.validate(&Value::Object(output))
    }

    /// The post-processed safe fallback for this request, when the flow
    /// declares a safety section.
    pub fn safe_fallback(&self, input: &Record) -> Option<Result<Record, Vec<Violation>>> {
        let (language, fallback) = self.safety.as_ref()?.fallback_for(input)?;
        tracing::debug!(flow = %self.name(), language, "Using safe fallback");
        Some(
            self.validate_output(fallback)
                .and_then(|output| self.post_process(input, output)),
        )
    }
}

fn compile_template(
    role: &str,
    source: &str,
    input: &Contract,
    problems: &mut Vec<String>,
) -> Option<Template> {
    match Template::parse(source) {
        Ok(template) => {
            problems.extend(
                template
                    .check(input)
                    .into_iter()
                    .map(|e| format!("{}: {}", role, e)),
            );
            Some(template)
        }
        Err(e) => {
            problems.push(format!("{}: {}", role, e));
            None
        }
    }
}
