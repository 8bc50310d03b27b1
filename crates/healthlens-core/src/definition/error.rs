use thiserror::Error;

/// Errors raised while loading or compiling a flow definition.
///
/// These are configuration defects: a definition either compiles completely
/// or is rejected with every problem found.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read flow definition: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Flow definition does not match the schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Flow '{flow}' is invalid: {}", .problems.join("; "))]
    Invalid { flow: String, problems: Vec<String> },
}

impl DefinitionError {
    /// Every individual problem, one per line of a report.
    pub fn problems(&self) -> Vec<String> {
        match self {
            DefinitionError::SchemaError(errors) => errors.clone(),
            DefinitionError::Invalid { problems, .. } => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}
