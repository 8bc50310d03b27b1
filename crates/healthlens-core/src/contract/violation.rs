//! Field-level validation failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong with a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    TypeMismatch { expected: String, found: String },
    TooShort { min_length: usize, actual: usize },
    TooLong { max_length: usize, actual: usize },
    PatternMismatch { pattern: String },
    BelowMinimum { minimum: f64, actual: f64 },
    AboveMaximum { maximum: f64, actual: f64 },
    NotInEnum { allowed: Vec<String>, actual: String },
    TooFewItems { min_items: usize, actual: usize },
    TooManyItems { max_items: usize, actual: usize },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "required field is missing"),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ViolationKind::TooShort { min_length, actual } => write!(
                f,
                "must be at least {} characters (got {})",
                min_length, actual
            ),
            ViolationKind::TooLong { max_length, actual } => write!(
                f,
                "must be at most {} characters (got {})",
                max_length, actual
            ),
            ViolationKind::PatternMismatch { pattern } => {
                write!(f, "does not match pattern {}", pattern)
            }
            ViolationKind::BelowMinimum { minimum, actual } => {
                write!(f, "must be >= {} (got {})", minimum, actual)
            }
            ViolationKind::AboveMaximum { maximum, actual } => {
                write!(f, "must be <= {} (got {})", maximum, actual)
            }
            ViolationKind::NotInEnum { allowed, actual } => write!(
                f,
                "'{}' is not one of [{}]",
                actual,
                allowed.join(", ")
            ),
            ViolationKind::TooFewItems { min_items, actual } => {
                write!(f, "must have at least {} items (got {})", min_items, actual)
            }
            ViolationKind::TooManyItems { max_items, actual } => {
                write!(f, "must have at most {} items (got {})", max_items, actual)
            }
        }
    }
}

/// A single violation, located by its path in the validated value.
///
/// Paths use dots for object members and `[i]` for array elements, e.g.
/// `dietaryPreferences.allergies[0]`. The whole value is `$`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{field}: {kind}")]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// Whether this violation is about the given field or one of its children.
    pub fn concerns(&self, field: &str) -> bool {
        self.field == field
            || self
                .field
                .strip_prefix(field)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
    }
}

/// Join violations into a single human-readable line.
pub fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
