//! Elicitation form schemas.
//!
//! The orchestrator only needs "something that turns missing fields into a
//! form description"; [`FormSchemaBuilder`] is the JSON Schema rendition used
//! by the tool server. Constraint routing (native keyword vs. extension
//! metadata) lives entirely here.

use serde_json::{json, Map, Value};

use crate::rules::{Constraint, MissingField};

/// Builds the form description sent with an elicitation prompt.
pub trait SchemaBuilder: Send + Sync {
    fn build(&self, fields: &[MissingField]) -> Value;
}

/// Constraint names translated to JSON Schema keywords. Anything else,
/// including `strict`, is copied onto the property unchanged.
const NATIVE_CONSTRAINTS: &[(&str, &str)] = &[
    ("gt", "exclusiveMinimum"),
    ("ge", "minimum"),
    ("lt", "exclusiveMaximum"),
    ("le", "maximum"),
    ("multiple_of", "multipleOf"),
    ("min_length", "minLength"),
    ("max_length", "maxLength"),
    ("pattern", "pattern"),
];

/// Flat JSON Schema object: one property per missing field, keyed by flat key.
#[derive(Debug, Clone, Copy)]
pub struct FormSchemaBuilder {
    pub title: &'static str,
}

impl FormSchemaBuilder {
    pub const DEFAULT: FormSchemaBuilder = FormSchemaBuilder {
        title: "MissingFields",
    };
}

impl Default for FormSchemaBuilder {
    fn default() -> Self {
        FormSchemaBuilder::DEFAULT
    }
}

impl SchemaBuilder for FormSchemaBuilder {
    fn build(&self, fields: &[MissingField]) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in fields {
            properties.insert(field.flat_key.clone(), property(field));
            if field.default.is_none() {
                required.push(Value::String(field.flat_key.clone()));
            }
        }
        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn property(field: &MissingField) -> Value {
    let mut prop = Map::new();
    prop.insert("description".into(), field.prompt.clone().into());

    if field.enum_values.is_empty() {
        prop.insert("type".into(), field.field_type.schema_type().into());
    } else {
        prop.insert("type".into(), "string".into());
        prop.insert("enum".into(), json!(field.enum_values));
        if field.enum_titles.len() == field.enum_values.len() {
            let one_of: Vec<Value> = field
                .enum_values
                .iter()
                .zip(field.enum_titles)
                .map(|(value, title)| json!({"const": value, "title": title}))
                .collect();
            prop.insert("oneOf".into(), one_of.into());
        }
    }

    if let Some(default) = field.default {
        prop.insert("default".into(), default.into());
    }
    route_constraints(field.constraints, &mut prop);
    Value::Object(prop)
}

fn route_constraints(constraints: &[Constraint], prop: &mut Map<String, Value>) {
    for (name, value) in constraints {
        let keyword = NATIVE_CONSTRAINTS
            .iter()
            .find(|(native, _)| native == name)
            .map_or(*name, |(_, keyword)| *keyword);
        prop.insert(keyword.to_string(), (*value).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ConstraintValue, FieldRule, FieldType};

    fn build(rules: &[FieldRule]) -> Value {
        let fields: Vec<MissingField> = rules.iter().map(FieldRule::missing).collect();
        FormSchemaBuilder::default().build(&fields)
    }

    #[test]
    fn plain_string_field() {
        let schema = build(&[FieldRule::new("A.Name", "name", "Shipper name")]);
        assert_eq!(schema["type"], "object");
        assert_eq!(
            schema["properties"]["name"],
            json!({"type": "string", "description": "Shipper name"})
        );
        assert_eq!(schema["required"], json!(["name"]));
    }

    #[test]
    fn enum_with_titles_gets_one_of() {
        let schema = build(&[FieldRule::new("A.Code", "code", "Charge type")
            .one_of(&["01", "02"], &["Transportation", "Duties and Taxes"])
            .with_default("01")]);
        let prop = &schema["properties"]["code"];
        assert_eq!(prop["enum"], json!(["01", "02"]));
        assert_eq!(
            prop["oneOf"],
            json!([
                {"const": "01", "title": "Transportation"},
                {"const": "02", "title": "Duties and Taxes"},
            ])
        );
        assert_eq!(prop["default"], "01");
        assert_eq!(schema["required"], json!([]));
    }

    #[test]
    fn enum_without_titles_has_no_one_of() {
        let schema = build(&[FieldRule::new("U", "weight_unit", "Weight unit").one_of(&["LBS", "KGS"], &[])]);
        assert!(schema["properties"]["weight_unit"].get("oneOf").is_none());
    }

    #[test]
    fn native_constraints_are_translated() {
        let schema = build(&[FieldRule::new("W", "weight", "Package weight")
            .typed(FieldType::Float)
            .constrained(&[("gt", ConstraintValue::Int(0)), ("le", ConstraintValue::Int(150))])]);
        let prop = &schema["properties"]["weight"];
        assert_eq!(prop["type"], "number");
        assert_eq!(prop["exclusiveMinimum"], 0);
        assert_eq!(prop["maximum"], 150);
        assert!(prop.get("gt").is_none());
    }

    #[test]
    fn extension_constraints_pass_through_including_strict() {
        let schema = build(&[FieldRule::new("C", "country", "Country").constrained(&[
            ("maxLength", ConstraintValue::Int(2)),
            ("pattern", ConstraintValue::Text("^[A-Z]{2}$")),
            ("strict", ConstraintValue::Flag(true)),
        ])]);
        let prop = &schema["properties"]["country"];
        assert_eq!(prop["maxLength"], 2);
        assert_eq!(prop["pattern"], "^[A-Z]{2}$");
        assert_eq!(prop["strict"], true);
    }

    #[test]
    fn property_order_follows_fields() {
        let schema = build(&[
            FieldRule::new("A", "zeta", "Z"),
            FieldRule::new("B", "alpha", "A"),
        ]);
        assert_eq!(schema["required"], json!(["zeta", "alpha"]));
        let keys: Vec<&str> = schema["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        let rendered = serde_json::to_string(&schema["properties"]).unwrap();
        assert!(rendered.find("zeta").unwrap() < rendered.find("alpha").unwrap());
    }
}
