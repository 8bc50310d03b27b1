//! Contracts: typed descriptions of a flow's input or output.
//!
//! A contract is an ordered list of [`FieldSpec`]s. It is loaded once with
//! its flow definition and then used for every invocation to validate raw
//! requests and model payloads.

mod export;
mod field;
mod validate;
mod violation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use field::{FieldSpec, FieldType, Pattern};
pub use violation::{describe, Violation, ViolationKind};

pub(crate) use validate::validate_value;

use crate::path::FieldPath;

/// A validated request or output: field name to value.
pub type Record = Map<String, Value>;

/// Ordered set of field declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contract {
    fields: Vec<FieldSpec>,
}

impl Contract {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a dot path through nested object fields.
    pub fn resolve(&self, path: &FieldPath) -> Option<&FieldSpec> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.field(first)?;
        for segment in rest {
            match &current.ty {
                FieldType::Object { fields } => current = fields.field(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Validate a raw value, returning the normalized record or every violation.
    pub fn validate(&self, raw: &Value) -> Result<Record, Vec<Violation>> {
        validate::validate_record(self, raw)
    }

    /// Structural problems in the contract itself: duplicate names, empty
    /// enums, inverted bounds, defaults that fail their own type.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        collect_problems(self, "", &mut problems);
        problems
    }
}

fn collect_problems(contract: &Contract, prefix: &str, problems: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();

    for field in contract.iter() {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        if !crate::path::SEGMENT_PATTERN.is_match(&field.name) {
            problems.push(format!("Field '{}' is not a valid identifier", path));
        }
        if !seen.insert(field.name.as_str()) {
            problems.push(format!("Duplicate field: {}", path));
        }
        if let Some(default) = &field.default {
            for violation in validate_value(&field.ty, default, &path) {
                problems.push(format!("Default for '{}' is invalid: {}", path, violation));
            }
        }

        collect_type_problems(&field.ty, &path, problems);
    }
}

fn collect_type_problems(ty: &FieldType, path: &str, problems: &mut Vec<String>) {
    match ty {
        FieldType::String {
            min_length: Some(min),
            max_length: Some(max),
            ..
        } if min > max => problems.push(format!("'{}': min_length exceeds max_length", path)),
        FieldType::Integer {
            minimum: Some(min),
            maximum: Some(max),
        } if min > max => problems.push(format!("'{}': minimum exceeds maximum", path)),
        FieldType::Number {
            minimum: Some(min),
            maximum: Some(max),
        } if min > max => problems.push(format!("'{}': minimum exceeds maximum", path)),
        FieldType::Enum { values } if values.is_empty() => {
            problems.push(format!("'{}': enum has no values", path))
        }
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            if let (Some(min), Some(max)) = (min_items, max_items) {
                if min > max {
                    problems.push(format!("'{}': min_items exceeds max_items", path));
                }
            }
            collect_type_problems(items, &format!("{}[]", path), problems);
        }
        FieldType::Object { fields } => collect_problems(fields, path, problems),
        _ => {}
    }
}
