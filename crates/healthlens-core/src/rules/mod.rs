//! Post-processing rules.
//!
//! Rules are declared per flow, run in declaration order on a validated
//! output, and are pure functions of `(validated input, output)`.

mod disclaimer;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use disclaimer::{EnsureDisclaimer, DEFAULT_MARKERS};

use crate::contract::{validate_value, Contract, FieldType, Record};
use crate::path::FieldPath;

/// A declared post-processing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PostRule {
    /// Guarantee a disclaimer in a health-guidance field
    EnsureDisclaimer(EnsureDisclaimer),

    /// Replace an absent, null, blank or empty value
    FillIfEmpty { field: FieldPath, value: Value },

    /// Truncate an array field to `max`, or to the integer input field
    /// `max_field`, whichever is smaller
    LimitItems {
        field: FieldPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_field: Option<FieldPath>,
    },
}

impl PostRule {
    /// Rule name as written in definitions.
    pub fn name(&self) -> &'static str {
        match self {
            PostRule::EnsureDisclaimer(_) => "ensure_disclaimer",
            PostRule::FillIfEmpty { .. } => "fill_if_empty",
            PostRule::LimitItems { .. } => "limit_items",
        }
    }

    /// Apply the rule; returns whether the output changed.
    pub fn apply(&self, input: &Record, output: &mut Record) -> bool {
        match self {
            PostRule::EnsureDisclaimer(rule) => rule.apply(input, output),
            PostRule::FillIfEmpty { field, value } => {
                let empty = match field.lookup(output) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.trim().is_empty(),
                    Some(Value::Array(a)) => a.is_empty(),
                    Some(_) => false,
                };
                empty && field.set(output, value.clone())
            }
            PostRule::LimitItems {
                field,
                max,
                max_field,
            } => {
                let from_input = max_field
                    .as_ref()
                    .and_then(|path| path.lookup(input))
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
                let Some(bound) = max.iter().copied().chain(from_input).min() else {
                    return false;
                };
                match field.lookup_mut(output) {
                    Some(Value::Array(items)) if items.len() > bound => {
                        items.truncate(bound);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    /// Configuration problems against the flow's contracts.
    pub fn problems(&self, input: &Contract, output: &Contract) -> Vec<String> {
        match self {
            PostRule::EnsureDisclaimer(rule) => rule.problems(input, output),
            PostRule::FillIfEmpty { field, value } => match output.resolve(field) {
                Some(spec) => validate_value(&spec.ty, value, &field.to_string())
                    .into_iter()
                    .map(|v| format!("fill_if_empty: replacement is invalid: {}", v))
                    .collect(),
                None => vec![format!("fill_if_empty: no output field '{}'", field)],
            },
            PostRule::LimitItems {
                field,
                max,
                max_field,
            } => limit_problems(field, *max, max_field.as_ref(), input, output),
        }
    }
}

fn limit_problems(
    field: &FieldPath,
    max: Option<usize>,
    max_field: Option<&FieldPath>,
    input: &Contract,
    output: &Contract,
) -> Vec<String> {
    let min_items = match output.resolve(field).map(|f| &f.ty) {
        Some(FieldType::Array { min_items, .. }) => min_items.unwrap_or(0),
        Some(other) => {
            return vec![format!(
                "limit_items: '{}' is a {}, expected array",
                field,
                other.type_name()
            )]
        }
        None => return vec![format!("limit_items: no output field '{}'", field)],
    };

    let mut problems = Vec::new();
    if max.is_none() && max_field.is_none() {
        problems.push(format!("limit_items: '{}' needs max or max_field", field));
    }
    if let Some(max) = max.filter(|max| *max < min_items) {
        problems.push(format!(
            "limit_items: max {} for '{}' is below its min_items",
            max, field
        ));
    }
    if let Some(path) = max_field {
        match input.resolve(path).map(|f| &f.ty) {
            Some(FieldType::Integer { minimum, .. }) => {
                if minimum.unwrap_or(i64::MIN) < min_items as i64 {
                    problems.push(format!(
                        "limit_items: input '{}' may be below the min_items of '{}'",
                        path, field
                    ));
                }
            }
            Some(other) => problems.push(format!(
                "limit_items: input '{}' is a {}, expected integer",
                path,
                other.type_name()
            )),
            None => problems.push(format!("limit_items: no input field '{}'", path)),
        }
    }
    problems
}

/// Apply rules in order.
pub fn apply_all(rules: &[PostRule], input: &Record, output: &mut Record) {
    for rule in rules {
        if rule.apply(input, output) {
            tracing::debug!(rule = rule.name(), "Post-processing rule changed output");
        }
    }
}
