//! The serialized form of a flow definition.

use serde::{Deserialize, Serialize};

use super::generation::GenerationSpec;
use crate::contract::Contract;
use crate::rules::PostRule;
use crate::safety::SafetySpec;

fn default_version() -> String {
    "1".to_string()
}

/// A flow definition document as written in YAML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    /// Flow identifier (snake_case)
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Safe to retry automatically on transient failures
    #[serde(default)]
    pub idempotent: bool,

    pub input: Contract,

    pub output: Contract,

    /// System instruction template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Prompt template
    pub prompt: String,

    #[serde(default)]
    pub generation: GenerationSpec,

    /// Post-processing rules, in application order
    #[serde(default)]
    pub rules: Vec<PostRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetySpec>,
}
