//! Contract validation.
//!
//! Validation both checks and normalizes: defaults are applied, unknown keys
//! are dropped, and every violation is collected rather than stopping at the
//! first one.

use serde_json::{Map, Value};

use super::field::FieldType;
use super::violation::{Violation, ViolationKind};
use super::{Contract, Record};

/// Validate a top-level value that must be an object.
pub(crate) fn validate_record(contract: &Contract, raw: &Value) -> Result<Record, Vec<Violation>> {
    match raw {
        Value::Object(map) => {
            let mut violations = Vec::new();
            let record = validate_fields(contract, map, "", &mut violations);
            if violations.is_empty() {
                Ok(record)
            } else {
                Err(violations)
            }
        }
        other => Err(vec![Violation::new(
            "$",
            ViolationKind::TypeMismatch {
                expected: "object".to_string(),
                found: describe_value(other).to_string(),
            },
        )]),
    }
}

/// Validate a single value against a field type (used for defaults and fallbacks).
pub(crate) fn validate_value(ty: &FieldType, value: &Value, path: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    check(ty, value, path, &mut violations);
    violations
}

fn validate_fields(
    contract: &Contract,
    map: &Map<String, Value>,
    prefix: &str,
    violations: &mut Vec<Violation>,
) -> Record {
    let mut record = Record::new();

    for field in contract.iter() {
        let path = join(prefix, &field.name);
        let value = match map.get(&field.name) {
            Some(Value::Null) | None => match &field.default {
                Some(default) => default.clone(),
                None => {
                    if field.required {
                        violations.push(Violation::new(path, ViolationKind::Missing));
                    }
                    continue;
                }
            },
            Some(value) => value.clone(),
        };

        if let Some(normalized) = check(&field.ty, &value, &path, violations) {
            record.insert(field.name.clone(), normalized);
        }
    }

    for key in map.keys() {
        if contract.field(key).is_none() {
            tracing::debug!(field = %join(prefix, key), "Dropping undeclared field");
        }
    }

    record
}

/// Check a value; returns the normalized value when its type matched.
fn check(
    ty: &FieldType,
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    match ty {
        FieldType::String {
            min_length,
            max_length,
            pattern,
        } => {
            let Some(text) = value.as_str() else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            let length = text.chars().count();
            if let Some(min) = min_length {
                if length < *min {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::TooShort {
                            min_length: *min,
                            actual: length,
                        },
                    ));
                }
            }
            if let Some(max) = max_length {
                if length > *max {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::TooLong {
                            max_length: *max,
                            actual: length,
                        },
                    ));
                }
            }
            if let Some(pattern) = pattern {
                if !pattern.is_match(text) {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::PatternMismatch {
                            pattern: pattern.as_str().to_string(),
                        },
                    ));
                }
            }
            Some(value.clone())
        }
        FieldType::Integer { minimum, maximum } => {
            let Some(number) = as_integer(value) else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            check_bounds(
                path,
                number as f64,
                minimum.map(|m| m as f64),
                maximum.map(|m| m as f64),
                violations,
            );
            Some(Value::from(number))
        }
        FieldType::Number { minimum, maximum } => {
            let Some(number) = value.as_f64() else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            check_bounds(path, number, *minimum, *maximum, violations);
            Some(value.clone())
        }
        FieldType::Boolean => {
            if value.is_boolean() {
                Some(value.clone())
            } else {
                violations.push(mismatch(path, ty, value));
                None
            }
        }
        FieldType::Enum { values } => {
            let Some(text) = value.as_str() else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            if !values.iter().any(|allowed| allowed == text) {
                violations.push(Violation::new(
                    path,
                    ViolationKind::NotInEnum {
                        allowed: values.clone(),
                        actual: text.to_string(),
                    },
                ));
            }
            Some(value.clone())
        }
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            let Some(elements) = value.as_array() else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            if let Some(min) = min_items {
                if elements.len() < *min {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::TooFewItems {
                            min_items: *min,
                            actual: elements.len(),
                        },
                    ));
                }
            }
            if let Some(max) = max_items {
                if elements.len() > *max {
                    violations.push(Violation::new(
                        path,
                        ViolationKind::TooManyItems {
                            max_items: *max,
                            actual: elements.len(),
                        },
                    ));
                }
            }
            let normalized = elements
                .iter()
                .enumerate()
                .filter_map(|(index, element)| {
                    check(items, element, &format!("{}[{}]", path, index), violations)
                })
                .collect();
            Some(Value::Array(normalized))
        }
        FieldType::Object { fields } => {
            let Some(map) = value.as_object() else {
                violations.push(mismatch(path, ty, value));
                return None;
            };
            Some(Value::Object(validate_fields(fields, map, path, violations)))
        }
    }
}

fn check_bounds(
    path: &str,
    actual: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    violations: &mut Vec<Violation>,
) {
    if let Some(minimum) = minimum {
        if actual < minimum {
            violations.push(Violation::new(
                path,
                ViolationKind::BelowMinimum { minimum, actual },
            ));
        }
    }
    if let Some(maximum) = maximum {
        if actual > maximum {
            violations.push(Violation::new(
                path,
                ViolationKind::AboveMaximum { maximum, actual },
            ));
        }
    }
}

/// Integers are accepted as JSON integers or as floats with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    let float = value.as_f64()?;
    if float.fract() == 0.0 && float.abs() < 9.0e15 {
        Some(float as i64)
    } else {
        None
    }
}

fn mismatch(path: &str, ty: &FieldType, value: &Value) -> Violation {
    Violation::new(
        path,
        ViolationKind::TypeMismatch {
            expected: ty.type_name().to_string(),
            found: describe_value(value).to_string(),
        },
    )
}

fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
