//! Rendering a parsed template against a validated record.
//!
//! Values are written as plain text after parsing has finished, so nothing a
//! caller supplies can open, close or select a block.

use serde_json::{Map, Value};

use super::ast::{Node, Reference};

struct Scope<'a> {
    item: &'a Value,
    index: usize,
}

pub(crate) fn render(nodes: &[Node], record: &Map<String, Value>) -> String {
    let mut out = String::new();
    let mut scopes = Vec::new();
    render_nodes(nodes, record, &mut scopes, &mut out);
    out
}

fn render_nodes<'a>(
    nodes: &'a [Node],
    record: &'a Map<String, Value>,
    scopes: &mut Vec<Scope<'a>>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Value(reference) => {
                if let Some(value) = resolve(reference, record, scopes) {
                    format_value(&value, out);
                }
            }
            Node::Conditional {
                reference,
                negate,
                then,
                otherwise,
            } => {
                let present = resolve(reference, record, scopes).is_some_and(|v| is_truthy(&v));
                let branch = if present != *negate { then } else { otherwise };
                render_nodes(branch, record, scopes, out);
            }
            Node::Each {
                reference,
                body,
                otherwise,
            } => match resolve(reference, record, scopes) {
                Some(Resolved::Borrowed(Value::Array(items))) if !items.is_empty() => {
                    for (index, item) in items.iter().enumerate() {
                        scopes.push(Scope { item, index });
                        render_nodes(body, record, scopes, out);
                        scopes.pop();
                    }
                }
                _ => render_nodes(otherwise, record, scopes, out),
            },
        }
    }
}

/// A resolved reference: either a value in the record or a computed index.
enum Resolved<'a> {
    Borrowed(&'a Value),
    Index(usize),
}

fn resolve<'a>(
    reference: &Reference,
    record: &'a Map<String, Value>,
    scopes: &[Scope<'a>],
) -> Option<Resolved<'a>> {
    match reference {
        Reference::Root(path) => path.lookup(record).map(Resolved::Borrowed),
        Reference::This(members) => {
            let mut current = scopes.last()?.item;
            for member in members {
                current = current.as_object()?.get(member)?;
            }
            Some(Resolved::Borrowed(current))
        }
        Reference::Index => scopes.last().map(|s| Resolved::Index(s.index)),
    }
}

fn is_truthy(resolved: &Resolved<'_>) -> bool {
    match resolved {
        Resolved::Index(_) => true,
        Resolved::Borrowed(value) => match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(_) => true,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        },
    }
}

fn format_value(resolved: &Resolved<'_>, out: &mut String) {
    match resolved {
        Resolved::Index(index) => out.push_str(&index.to_string()),
        Resolved::Borrowed(value) => write_value(value, out),
    }
}

/// Text form of a value inside a prompt.
///
/// Strings verbatim, integers in decimal, floats in shortest round-trip form
/// with integral floats printed without `.0`, booleans as `true`/`false`,
/// null as nothing, arrays joined by `", "`, objects as compact JSON.
pub fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&i.to_string());
            } else if let Some(u) = n.as_u64() {
                out.push_str(&u.to_string());
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    out.push_str(&(f as i64).to_string());
                } else {
                    out.push_str(&f.to_string());
                }
            }
        }
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(item, out);
            }
        }
        Value::Object(_) => out.push_str(&value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;
    use serde_json::json;

    fn render_source(source: &str, record: Value) -> String {
        let nodes = parse(source).unwrap();
        render(&nodes, record.as_object().unwrap())
    }

    #[test]
    fn test_simple_substitution_and_formatting() {
        let out = render_source(
            "{{age}}|{{weight}}|{{height}}|{{active}}|{{goals}}|{{prefs}}|{{missing}}",
            json!({
                "age": 30,
                "weight": 70.0,
                "height": 170.5,
                "active": true,
                "goals": ["a", "b"],
                "prefs": {"vegan": false}
            }),
        );
        assert_eq!(out, "30|70|170.5|true|a, b|{\"vegan\":false}|");
    }

    #[test]
    fn test_conditionals() {
        let source = "{{#if notes}}Notes: {{notes}}{{else}}No notes{{/if}}{{#unless vegan}} (eats anything){{/unless}}";
        assert_eq!(
            render_source(source, json!({"notes": "low salt", "vegan": true})),
            "Notes: low salt"
        );
        assert_eq!(
            render_source(source, json!({"notes": "", "vegan": false})),
            "No notes (eats anything)"
        );
        assert_eq!(render_source(source, json!({})), "No notes (eats anything)");
    }

    #[test]
    fn test_each_preserves_order_and_binds_element() {
        let out = render_source(
            "{{#each symptoms}}{{@index}}:{{this.name}}({{age}}) {{/each}}",
            json!({"age": 40, "symptoms": [{"name": "cough"}, {"name": "fever"}]}),
        );
        assert_eq!(out, "0:cough(40) 1:fever(40) ");
    }

    #[test]
    fn test_each_else_for_empty_or_missing() {
        let source = "{{#each goals}}- {{this}}\n{{else}}no goals{{/each}}";
        assert_eq!(render_source(source, json!({"goals": []})), "no goals");
        assert_eq!(render_source(source, json!({})), "no goals");
        assert_eq!(
            render_source(source, json!({"goals": ["sleep", "walk"]})),
            "- sleep\n- walk\n"
        );
    }

    #[test]
    fn test_nested_each() {
        let out = render_source(
            "{{#each days}}[{{#each this.meals}}{{this}};{{/each}}]{{/each}}",
            json!({"days": [{"meals": ["oats", "soup"]}, {"meals": ["rice"]}]}),
        );
        assert_eq!(out, "[oats;soup;][rice;]");
    }

    #[test]
    fn test_values_with_delimiters_are_literal() {
        let out = render_source(
            "Goal: {{goal}}{{#if secret}} SECRET{{/if}}",
            json!({"goal": "{{secret}} {{#if x}}{{/if}} }}"}),
        );
        assert_eq!(out, "Goal: {{secret}} {{#if x}}{{/if}} }}");
    }

    #[test]
    fn test_zero_is_present() {
        assert_eq!(
            render_source("{{#if count}}yes{{else}}no{{/if}}", json!({"count": 0})),
            "yes"
        );
    }
}
