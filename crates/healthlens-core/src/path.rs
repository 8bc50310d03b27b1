//! Dot-separated field paths (`dietaryPreferences.allergies`).
//!
//! Paths address object members only; array elements are never addressed by
//! a path, they are reached through `{{#each}}` blocks or rule semantics.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

lazy_static! {
    /// A single path segment: an identifier as used in contracts and templates.
    pub static ref SEGMENT_PATTERN: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// A path that failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid field path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

/// A parsed, non-empty field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dot-separated path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathError {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            if !SEGMENT_PATTERN.is_match(segment) {
                return Err(PathError {
                    path: path.to_string(),
                    reason: format!("'{}' is not a valid identifier", segment),
                });
            }
            segments.push(segment.to_string());
        }

        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment, i.e. the top-level field name.
    pub fn head(&self) -> &str {
        &self.0[0]
    }

    /// Resolve the path against a record.
    pub fn lookup<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = root.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Mutable resolution against a record.
    pub fn lookup_mut<'a>(&self, root: &'a mut Map<String, Value>) -> Option<&'a mut Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = root.get_mut(first)?;
        for segment in rest {
            current = current.as_object_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    /// Set the value at this path, creating intermediate objects when they
    /// are absent. Returns false when an intermediate value is not an object.
    pub fn set(&self, root: &mut Map<String, Value>, value: Value) -> bool {
        let Some((last, parents)) = self.0.split_last() else {
            return false;
        };

        let mut current = root;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if entry.is_null() {
                *entry = Value::Object(Map::new());
            }
            match entry.as_object_mut() {
                Some(map) => current = map,
                None => return false,
            }
        }

        current.insert(last.clone(), value);
        true
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl std::str::FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let path = FieldPath::parse("dietaryPreferences.allergies").unwrap();
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.head(), "dietaryPreferences");
        assert_eq!(path.to_string(), "dietaryPreferences.allergies");
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("1abc").is_err());
        assert!(FieldPath::parse("a-b").is_err());
    }

    #[test]
    fn test_lookup_nested() {
        let record = json!({"a": {"b": {"c": 3}}});
        let record = record.as_object().unwrap();
        let path = FieldPath::parse("a.b.c").unwrap();
        assert_eq!(path.lookup(record), Some(&json!(3)));
        assert_eq!(FieldPath::parse("a.x").unwrap().lookup(record), None);
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut record = Map::new();
        let path = FieldPath::parse("outer.inner").unwrap();
        assert!(path.set(&mut record, json!("v")));
        assert_eq!(Value::Object(record), json!({"outer": {"inner": "v"}}));
    }

    #[test]
    fn test_set_refuses_non_object_parent() {
        let mut record = json!({"outer": 5}).as_object().unwrap().clone();
        let path = FieldPath::parse("outer.inner").unwrap();
        assert!(!path.set(&mut record, json!("v")));
    }
}
