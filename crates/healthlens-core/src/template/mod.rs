//! Prompt templates.
//!
//! A small Handlebars-flavoured language parsed into an explicit tree:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{{path.to.field}}` | value from the validated request |
//! | `{{#if path}}…{{else}}…{{/if}}` | emitted iff the value is present and non-empty |
//! | `{{#unless path}}…{{/unless}}` | inverse of `if` |
//! | `{{#each path}}…{{else}}…{{/each}}` | once per array element, in order |
//! | `{{this}}`, `{{this.member}}`, `{{@index}}` | current element inside `each` |
//! | `{{! comment }}` | dropped |
//! | `\{{` | literal `{{` |
//!
//! Templates are parsed and checked against the input contract when a flow
//! is compiled. Rendering is infallible and never re-parses inserted values.

mod ast;
mod check;
mod parser;
mod render;

use serde_json::{Map, Value};

pub use ast::{BlockKind, Node, Reference};
pub use check::TemplateResolutionError;
pub use parser::TemplateError;
pub use render::write_value;

use crate::contract::Contract;

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let nodes = parser::parse(&source)?;
        Ok(Self { source, nodes })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every reference that the input contract cannot satisfy.
    pub fn check(&self, contract: &Contract) -> Vec<TemplateResolutionError> {
        check::check(&self.nodes, contract)
    }

    /// Render against a validated record.
    pub fn render(&self, record: &Map<String, Value>) -> String {
        render::render(&self.nodes, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FieldSpec, FieldType};
    use proptest::prelude::*;
    use serde_json::json;

    const SOURCE: &str =
        "Goal: {{goal}}.{{#if notes}} Notes: {{notes}}.{{/if}}{{#each tags}} [{{this}}]{{/each}}";

    fn template() -> Template {
        Template::parse(SOURCE).unwrap()
    }

    #[test]
    fn test_check_and_render() {
        let contract = Contract::new(vec![
            FieldSpec::required("goal", FieldType::string()),
            FieldSpec::optional("notes", FieldType::string()),
            FieldSpec::optional("tags", FieldType::array_of(FieldType::string())),
        ]);
        let template = template();
        assert!(template.check(&contract).is_empty());

        let record = json!({"goal": "sleep", "tags": ["a", "b"]});
        assert_eq!(
            template.render(record.as_object().unwrap()),
            "Goal: sleep. [a] [b]"
        );
        assert_eq!(template.source(), SOURCE);
    }

    proptest! {
        #[test]
        fn prop_values_render_verbatim(goal in ".*", tag in ".*") {
            let record = json!({"goal": goal.clone(), "tags": [tag.clone()]});
            let rendered = template().render(record.as_object().unwrap());
            prop_assert_eq!(rendered, format!("Goal: {}. [{}]", goal, tag));
        }

        #[test]
        fn prop_delimiters_in_values_do_not_change_blocks(
            prefix in "[a-z ]{0,8}",
            suffix in "[a-z ]{0,8}",
        ) {
            // a value shaped like template syntax must neither open the
            // `notes` block nor add elements
            let goal = format!(
                "{}{{{{#if notes}}}}{{{{notes}}}}{{{{/if}}}}{{{{#each tags}}}}{}",
                prefix, suffix
            );
            let record = json!({"goal": goal.clone()});
            let rendered = template().render(record.as_object().unwrap());
            prop_assert_eq!(rendered, format!("Goal: {}.", goal));
        }
    }
}
