//! JSON Schema export, sent to the model as the requested output shape.

use serde_json::{json, Map, Value};

use super::{Contract, FieldType};

impl Contract {
    /// Describe this contract as a JSON Schema object.
    ///
    /// Only the subset that hosted structured-output modes understand is
    /// emitted: `type`, `description`, `enum`, `items`, `properties`,
    /// `required` and numeric/length bounds.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in self.iter() {
            let mut schema = type_schema(&field.ty);
            if let (Some(description), Some(object)) = (&field.description, schema.as_object_mut())
            {
                object.insert("description".to_string(), json!(description));
            }
            properties.insert(field.name.clone(), schema);
            if field.required && field.default.is_none() {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn type_schema(ty: &FieldType) -> Value {
    let mut schema = Map::new();

    match ty {
        FieldType::String {
            min_length,
            max_length,
            ..
        } => {
            schema.insert("type".into(), json!("string"));
            if let Some(min) = min_length {
                schema.insert("minLength".into(), json!(min));
            }
            if let Some(max) = max_length {
                schema.insert("maxLength".into(), json!(max));
            }
        }
        FieldType::Integer { minimum, maximum } => {
            schema.insert("type".into(), json!("integer"));
            if let Some(min) = minimum {
                schema.insert("minimum".into(), json!(min));
            }
            if let Some(max) = maximum {
                schema.insert("maximum".into(), json!(max));
            }
        }
        FieldType::Number { minimum, maximum } => {
            schema.insert("type".into(), json!("number"));
            if let Some(min) = minimum {
                schema.insert("minimum".into(), json!(min));
            }
            if let Some(max) = maximum {
                schema.insert("maximum".into(), json!(max));
            }
        }
        FieldType::Boolean => {
            schema.insert("type".into(), json!("boolean"));
        }
        FieldType::Enum { values } => {
            schema.insert("type".into(), json!("string"));
            schema.insert("enum".into(), json!(values));
        }
        FieldType::Array {
            items,
            min_items,
            max_items,
        } => {
            schema.insert("type".into(), json!("array"));
            schema.insert("items".into(), type_schema(items));
            if let Some(min) = min_items {
                schema.insert("minItems".into(), json!(min));
            }
            if let Some(max) = max_items {
                schema.insert("maxItems".into(), json!(max));
            }
        }
        FieldType::Object { fields } => return fields.to_json_schema(),
    }

    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FieldSpec;

    #[test]
    fn test_schema_shape() {
        let contract = Contract::new(vec![
            FieldSpec::required("sentiment", FieldType::one_of(["positive", "negative"]))
                .with_description("Overall tone"),
            FieldSpec::optional("themes", FieldType::array_of(FieldType::string())),
        ]);
        let schema = contract.to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["sentiment"]["enum"][1], "negative");
        assert_eq!(schema["properties"]["sentiment"]["description"], "Overall tone");
        assert_eq!(schema["properties"]["themes"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["sentiment"]));
    }

    #[test]
    fn test_nested_object_schema() {
        let contract = Contract::new(vec![FieldSpec::required(
            "totals",
            FieldType::object(Contract::new(vec![FieldSpec::required(
                "calories",
                FieldType::number(),
            )])),
        )]);
        let schema = contract.to_json_schema();
        assert_eq!(schema["properties"]["totals"]["type"], "object");
        assert_eq!(
            schema["properties"]["totals"]["properties"]["calories"]["type"],
            "number"
        );
    }
}
