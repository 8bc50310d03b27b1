//! Template parser: source text to [`Node`] tree.

use thiserror::Error;

use super::ast::{BlockKind, Node, Reference};
use crate::path::{FieldPath, SEGMENT_PATTERN};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Syntax errors, reported with the byte offset of the offending tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unclosed tag starting at byte {offset}")]
    UnclosedTag { offset: usize },

    #[error("Empty tag at byte {offset}")]
    EmptyTag { offset: usize },

    #[error("Unknown block helper '#{name}' at byte {offset}")]
    UnknownHelper { name: String, offset: usize },

    #[error("Block '#{keyword}' at byte {offset} takes exactly one reference")]
    BadArgument { keyword: String, offset: usize },

    #[error("Closing tag '/{found}' at byte {offset} does not match the open block ({expected})")]
    MismatchedClose {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("'else' at byte {offset} is outside any block")]
    StrayElse { offset: usize },

    #[error("Second 'else' at byte {offset} in the same block")]
    DuplicateElse { offset: usize },

    #[error("Block '#{keyword}' opened at byte {offset} is never closed")]
    UnclosedBlock { keyword: String, offset: usize },

    #[error("Invalid reference '{text}' at byte {offset}")]
    InvalidReference { text: String, offset: usize },
}

enum Tag {
    Comment,
    Value(Reference),
    Open(BlockKind, Reference),
    Else,
    Close(String),
}

struct Frame {
    kind: BlockKind,
    reference: Reference,
    offset: usize,
    then: Vec<Node>,
    otherwise: Vec<Node>,
    in_else: bool,
}

impl Frame {
    fn current(&mut self) -> &mut Vec<Node> {
        if self.in_else {
            &mut self.otherwise
        } else {
            &mut self.then
        }
    }

    fn into_node(self) -> Node {
        match self.kind {
            BlockKind::If | BlockKind::Unless => Node::Conditional {
                reference: self.reference,
                negate: self.kind == BlockKind::Unless,
                then: self.then,
                otherwise: self.otherwise,
            },
            BlockKind::Each => Node::Each {
                reference: self.reference,
                body: self.then,
                otherwise: self.otherwise,
            },
        }
    }
}

/// Parse template source into a node list.
pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let Some(found) = source[pos..].find(OPEN) else {
            push_text(target(&mut root, &mut stack), &source[pos..]);
            break;
        };
        let start = pos + found;

        // `\{{` is a literal delimiter
        if start > pos && source[..start].ends_with('\\') {
            push_text(target(&mut root, &mut stack), &source[pos..start - 1]);
            push_text(target(&mut root, &mut stack), OPEN);
            pos = start + OPEN.len();
            continue;
        }

        push_text(target(&mut root, &mut stack), &source[pos..start]);

        let inner_start = start + OPEN.len();
        let Some(close) = source[inner_start..].find(CLOSE) else {
            return Err(TemplateError::UnclosedTag { offset: start });
        };
        let inner = &source[inner_start..inner_start + close];
        pos = inner_start + close + CLOSE.len();

        match classify(inner, start)? {
            Tag::Comment => {}
            Tag::Value(reference) => target(&mut root, &mut stack).push(Node::Value(reference)),
            Tag::Open(kind, reference) => stack.push(Frame {
                kind,
                reference,
                offset: start,
                then: Vec::new(),
                otherwise: Vec::new(),
                in_else: false,
            }),
            Tag::Else => {
                let frame = stack
                    .last_mut()
                    .ok_or(TemplateError::StrayElse { offset: start })?;
                if frame.in_else {
                    return Err(TemplateError::DuplicateElse { offset: start });
                }
                frame.in_else = true;
            }
            Tag::Close(keyword) => {
                let frame = stack.pop().ok_or_else(|| TemplateError::MismatchedClose {
                    expected: "none".to_string(),
                    found: keyword.clone(),
                    offset: start,
                })?;
                if frame.kind.keyword() != keyword {
                    return Err(TemplateError::MismatchedClose {
                        expected: frame.kind.keyword().to_string(),
                        found: keyword,
                        offset: start,
                    });
                }
                let node = frame.into_node();
                target(&mut root, &mut stack).push(node);
            }
        }
    }

    if let Some(frame) = stack.pop() {
        return Err(TemplateError::UnclosedBlock {
            keyword: frame.kind.keyword().to_string(),
            offset: frame.offset,
        });
    }

    Ok(root)
}

fn target<'a>(root: &'a mut Vec<Node>, stack: &'a mut [Frame]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(frame) => frame.current(),
        None => root,
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(existing)) = nodes.last_mut() {
        existing.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn classify(inner: &str, offset: usize) -> Result<Tag, TemplateError> {
    let trimmed = inner.trim();
    if trimmed.starts_with('!') {
        return Ok(Tag::Comment);
    }
    if trimmed.is_empty() {
        return Err(TemplateError::EmptyTag { offset });
    }

    if let Some(rest) = trimmed.strip_prefix('#') {
        let mut parts = rest.split_whitespace();
        let keyword = parts.next().unwrap_or_default();
        let kind = match keyword {
            "if" => BlockKind::If,
            "unless" => BlockKind::Unless,
            "each" => BlockKind::Each,
            other => {
                return Err(TemplateError::UnknownHelper {
                    name: other.to_string(),
                    offset,
                })
            }
        };
        let argument = parts.next();
        if argument.is_none() || parts.next().is_some() {
            return Err(TemplateError::BadArgument {
                keyword: keyword.to_string(),
                offset,
            });
        }
        let reference = parse_reference(argument.unwrap_or_default(), offset)?;
        return Ok(Tag::Open(kind, reference));
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        return Ok(Tag::Close(rest.trim().to_string()));
    }

    if trimmed == "else" {
        return Ok(Tag::Else);
    }

    parse_reference(trimmed, offset).map(Tag::Value)
}

fn parse_reference(text: &str, offset: usize) -> Result<Reference, TemplateError> {
    let invalid = || TemplateError::InvalidReference {
        text: text.to_string(),
        offset,
    };

    if text == "@index" {
        return Ok(Reference::Index);
    }
    if text == "this" {
        return Ok(Reference::This(Vec::new()));
    }
    if let Some(members) = text.strip_prefix("this.") {
        let members: Vec<String> = members.split('.').map(str::to_string).collect();
        if members.iter().all(|m| SEGMENT_PATTERN.is_match(m)) {
            return Ok(Reference::This(members));
        }
        return Err(invalid());
    }

    FieldPath::parse(text)
        .map(Reference::Root)
        .map_err(|_| invalid())
}
