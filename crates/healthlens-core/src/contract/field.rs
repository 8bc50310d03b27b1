//! Field declarations for contracts.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::Contract;

fn default_required() -> bool {
    true
}

/// A single named field of a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it appears in requests and model output
    pub name: String,

    /// Type and refinements
    #[serde(flatten)]
    pub ty: FieldType,

    /// Whether the field must be present (after defaults are applied)
    #[serde(default = "default_required")]
    pub required: bool,

    /// Value used when the field is missing or null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Human-readable documentation, also forwarded in the output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    /// Create a required field.
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: None,
        }
    }

    /// Create an optional field.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    /// Attach a default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Field type with its refinements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Array {
        items: Box<FieldType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    Object {
        fields: Contract,
    },
}

impl FieldType {
    /// Unrefined string.
    pub fn string() -> Self {
        FieldType::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Unrefined integer.
    pub fn integer() -> Self {
        FieldType::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// Unrefined number.
    pub fn number() -> Self {
        FieldType::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// Enum over the given values.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Array of the given item type, unrefined.
    pub fn array_of(items: FieldType) -> Self {
        FieldType::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// Nested object.
    pub fn object(fields: Contract) -> Self {
        FieldType::Object { fields }
    }

    /// Name used in messages and schemas.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "string",
            FieldType::Integer { .. } => "integer",
            FieldType::Number { .. } => "number",
            FieldType::Boolean => "boolean",
            FieldType::Enum { .. } => "enum",
            FieldType::Array { .. } => "array",
            FieldType::Object { .. } => "object",
        }
    }

    /// String-valued types (plain strings and enums).
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String { .. } | FieldType::Enum { .. })
    }
}

/// A compiled regular expression used as a string refinement.
///
/// Compiled when the contract is loaded, so an invalid pattern fails the
/// definition rather than an invocation.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pattern::new(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_field_with_refinements() {
        let yaml = r#"
name: dishName
type: string
min_length: 2
max_length: 80
pattern: "^[^<>]+$"
description: "Name of the dish"
"#;
        let field: FieldSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(field.name, "dishName");
        assert!(field.required);
        match field.ty {
            FieldType::String {
                min_length,
                max_length,
                pattern,
            } => {
                assert_eq!(min_length, Some(2));
                assert_eq!(max_length, Some(80));
                assert!(pattern.unwrap().is_match("Pad thai"));
            }
            other => panic!("unexpected type {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_array_of_objects() {
        let yaml = r#"
name: symptoms
type: array
min_items: 1
items:
  type: object
  fields:
    - name: name
      type: string
    - name: severity
      type: enum
      values: [mild, moderate, severe]
"#;
        let field: FieldSpec = serde_yaml::from_str(yaml).unwrap();
        match field.ty {
            FieldType::Array { items, min_items, .. } => {
                assert_eq!(min_items, Some(1));
                match *items {
                    FieldType::Object { fields } => assert_eq!(fields.len(), 2),
                    other => panic!("unexpected item type {:?}", other),
                }
            }
            other => panic!("unexpected type {:?}", other),
        }
    }

    #[test]
    fn test_invalid_pattern_rejected_at_load() {
        let yaml = r#"
name: code
type: string
pattern: "([unclosed"
"#;
        let result: Result<FieldSpec, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_optional_builder() {
        let field = FieldSpec::optional("notes", FieldType::string()).with_description("Free text");
        assert!(!field.required);
        assert_eq!(field.description.as_deref(), Some("Free text"));
        assert_eq!(field.ty.type_name(), "string");
    }
}
