//! Template syntax tree.

use std::fmt;

use crate::path::FieldPath;

/// A value reference inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Path from the request root (`age`, `dietaryPreferences.vegan`)
    Root(FieldPath),
    /// The current `each` element, optionally a member of it (`this`, `this.name`)
    This(Vec<String>),
    /// Zero-based position in the innermost `each`
    Index,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Root(path) => write!(f, "{}", path),
            Reference::This(members) if members.is_empty() => write!(f, "this"),
            Reference::This(members) => write!(f, "this.{}", members.join(".")),
            Reference::Index => write!(f, "@index"),
        }
    }
}

/// Block helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    pub fn keyword(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
        }
    }
}

/// A node of the parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Value(Reference),
    /// `if` / `unless`; `negate` is true for `unless`
    Conditional {
        reference: Reference,
        negate: bool,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Each {
        reference: Reference,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}
