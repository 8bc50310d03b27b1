//! Static reference check of a template against the input contract.

use thiserror::Error;

use super::ast::{Node, Reference};
use crate::contract::{Contract, FieldType};

/// A template reference that the input contract cannot satisfy.
///
/// This is a configuration error of the flow definition; it is detected when
/// the flow is compiled, never during an invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Template reference '{reference}' cannot be resolved: {reason}")]
pub struct TemplateResolutionError {
    pub reference: String,
    pub reason: String,
}

pub(crate) fn check(nodes: &[Node], contract: &Contract) -> Vec<TemplateResolutionError> {
    let mut errors = Vec::new();
    let mut scopes: Vec<&FieldType> = Vec::new();
    check_nodes(nodes, contract, &mut scopes, &mut errors);
    errors
}

fn check_nodes<'a>(
    nodes: &'a [Node],
    contract: &'a Contract,
    scopes: &mut Vec<&'a FieldType>,
    errors: &mut Vec<TemplateResolutionError>,
) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Value(reference) => {
                if let Err(e) = resolve(reference, contract, scopes) {
                    errors.push(e);
                }
            }
            Node::Conditional {
                reference,
                then,
                otherwise,
                ..
            } => {
                if let Err(e) = resolve(reference, contract, scopes) {
                    errors.push(e);
                }
                check_nodes(then, contract, scopes, errors);
                check_nodes(otherwise, contract, scopes, errors);
            }
            Node::Each {
                reference,
                body,
                otherwise,
            } => {
                match resolve(reference, contract, scopes) {
                    Ok(Some(FieldType::Array { items, .. })) => {
                        scopes.push(items);
                        check_nodes(body, contract, scopes, errors);
                        scopes.pop();
                    }
                    Ok(other) => {
                        errors.push(TemplateResolutionError {
                            reference: reference.to_string(),
                            reason: format!(
                                "'each' needs an array, found {}",
                                other.map_or("index", |t| t.type_name())
                            ),
                        });
                    }
                    Err(e) => errors.push(e),
                }
                check_nodes(otherwise, contract, scopes, errors);
            }
        }
    }
}

/// Resolve a reference to its declared type; `Ok(None)` is `@index`.
fn resolve<'a>(
    reference: &Reference,
    contract: &'a Contract,
    scopes: &[&'a FieldType],
) -> Result<Option<&'a FieldType>, TemplateResolutionError> {
    let fail = |reason: String| TemplateResolutionError {
        reference: reference.to_string(),
        reason,
    };

    match reference {
        Reference::Root(path) => {
            let (first, rest) = path
                .segments()
                .split_first()
                .ok_or_else(|| fail("empty path".to_string()))?;
            let field = contract
                .field(first)
                .ok_or_else(|| fail(format!("no input field named '{}'", first)))?;
            descend(&field.ty, rest).map(Some).map_err(fail)
        }
        Reference::This(members) => {
            let item = scopes
                .last()
                .ok_or_else(|| fail("'this' used outside an 'each' block".to_string()))?;
            descend(item, members).map(Some).map_err(fail)
        }
        Reference::Index => {
            if scopes.is_empty() {
                Err(fail("'@index' used outside an 'each' block".to_string()))
            } else {
                Ok(None)
            }
        }
    }
}

fn descend<'a>(mut ty: &'a FieldType, members: &[String]) -> Result<&'a FieldType, String> {
    for member in members {
        match ty {
            FieldType::Object { fields } => {
                ty = &fields
                    .field(member)
                    .ok_or_else(|| format!("object has no field '{}'", member))?
                    .ty;
            }
            other => {
                return Err(format!(
                    "cannot access '{}' on a {}",
                    member,
                    other.type_name()
                ))
            }
        }
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;
    use crate::template::parser::parse;

    fn contract() -> Contract {
        Contract::new(vec![
            FieldSpec::required("age", FieldType::integer()),
            FieldSpec::optional("goals", FieldType::array_of(FieldType::string())),
            FieldSpec::optional(
                "symptoms",
                FieldType::array_of(FieldType::object(Contract::new(vec![FieldSpec::required(
                    "name",
                    FieldType::string(),
                )]))),
            ),
            FieldSpec::optional(
                "prefs",
                FieldType::object(Contract::new(vec![FieldSpec::optional(
                    "vegan",
                    FieldType::Boolean,
                )])),
            ),
        ])
    }

    fn errors_for(source: &str) -> Vec<TemplateResolutionError> {
        check(&parse(source).unwrap(), &contract())
    }

    #[test]
    fn test_valid_template_has_no_errors() {
        let source = concat!(
            "{{age}} {{#if prefs.vegan}}vegan{{/if}} ",
            "{{#each symptoms}}{{@index}} {{this.name}} {{age}}{{/each}} ",
            "{{#each goals}}{{this}}{{/each}}",
        );
        assert!(errors_for(source).is_empty());
    }

    #[test]
    fn test_unknown_field() {
        let errors = errors_for("{{weight}}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].reference, "weight");
    }

    #[test]
    fn test_dot_access_into_scalar() {
        let errors = errors_for("{{age.years}}");
        assert!(errors[0].reason.contains("cannot access"));
    }

    #[test]
    fn test_this_outside_each() {
        assert_eq!(errors_for("{{this}} {{@index}}").len(), 2);
    }

    #[test]
    fn test_each_over_non_array() {
        let errors = errors_for("{{#each age}}x{{/each}}");
        assert!(errors[0].reason.contains("needs an array"));
    }

    #[test]
    fn test_unknown_member_of_item() {
        let errors = errors_for("{{#each symptoms}}{{this.severity}}{{/each}}");
        assert_eq!(errors[0].reference, "this.severity");
    }

    #[test]
    fn test_errors_inside_conditional_branches_found() {
        assert_eq!(errors_for("{{#if age}}{{nope}}{{else}}{{nada}}{{/if}}").len(), 2);
    }
}
