//! Repeating-collection rules whose items are collected through indexed flat
//! keys (`product_1_description`, `product_2_value`, ...).

use serde_json::{Map, Value};

use crate::path::{self, PathError};
use crate::rules::{FieldRule, MissingField};

/// Rules applied to every item of an array at `array_path`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayFieldRule {
    /// Absolute path of the array (no trailing index).
    pub array_path: &'static str,
    /// Flat-key prefix; item `n` uses `{prefix}_{n}_{rule.key}`.
    pub item_prefix: &'static str,
    /// Rules relative to each item.
    pub item_rules: &'static [FieldRule],
    pub max_items: usize,
    /// Placeholder items evaluated when the array is absent or empty.
    pub default_count: usize,
}

impl ArrayFieldRule {
    pub const fn new(
        array_path: &'static str,
        item_prefix: &'static str,
        item_rules: &'static [FieldRule],
    ) -> Self {
        ArrayFieldRule {
            array_path,
            item_prefix,
            item_rules,
            max_items: 50,
            default_count: 1,
        }
    }

    pub const fn capped(self, max_items: usize) -> Self {
        ArrayFieldRule { max_items, ..self }
    }

    fn flat_key(&self, n: usize, rule: &FieldRule) -> String {
        format!("{}_{}_{}", self.item_prefix, n, rule.key)
    }
}

/// Emit a missing field for every item rule not satisfied by its item.
///
/// A single map at `array_path` is treated as a one-element list. When the
/// collection is absent or empty, `max(default_count, start_count)`
/// placeholder items are reported. Items beyond `max_items` are ignored.
pub fn expand_array_fields(
    rule: &ArrayFieldRule,
    body: &Value,
    start_count: Option<usize>,
) -> Vec<MissingField> {
    let empty = Value::Object(Map::new());
    let existing: Vec<&Value> = match path::read(body, rule.array_path) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    let placeholders = rule.default_count.max(start_count.unwrap_or(0));
    let available = if existing.is_empty() {
        placeholders
    } else {
        existing.len()
    };
    let count = available.min(rule.max_items);

    let mut missing = Vec::new();
    for i in 0..count {
        let item = existing.get(i).copied().unwrap_or(&empty);
        let n = i + 1;
        for item_rule in rule.item_rules {
            if path::exists(item, item_rule.path) {
                continue;
            }
            missing.push(item_rule.missing_at(
                format!("{}[{}].{}", rule.array_path, i, item_rule.path),
                rule.flat_key(n, item_rule),
                format!("Item {}: {}", n, item_rule.prompt),
            ));
        }
    }
    missing
}

/// Rebuild `count` nested items from flat answers. Items with no answered
/// keys are dropped. Item rules whose paths collide are a
/// [`PathError::StructuralConflict`].
pub fn reconstruct_array(
    answers: &std::collections::BTreeMap<String, String>,
    rule: &ArrayFieldRule,
    count: usize,
) -> Result<Vec<Value>, PathError> {
    let mut items = Vec::new();
    for n in 1..=count {
        let mut item = Value::Object(Map::new());
        let mut touched = false;
        for item_rule in rule.item_rules {
            let Some(answer) = answers.get(&rule.flat_key(n, item_rule)) else {
                continue;
            };
            if answer.is_empty() {
                continue;
            }
            path::write(&mut item, item_rule.path, Value::String(answer.clone()))?;
            touched = true;
        }
        if touched {
            items.push(item);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FieldType;
    use serde_json::json;
    use std::collections::BTreeMap;

    const ITEM_RULES: &[FieldRule] = &[
        FieldRule::new("Description", "description", "Product description"),
        FieldRule::new("Value", "value", "Unit value").typed(FieldType::Float),
    ];

    const PRODUCTS: ArrayFieldRule =
        ArrayFieldRule::new("Root.Items.Product", "product", ITEM_RULES).capped(5);

    fn keys(missing: &[MissingField]) -> Vec<&str> {
        missing.iter().map(|f| f.flat_key.as_str()).collect()
    }

    #[test]
    fn absent_collection_yields_one_placeholder_item() {
        let missing = expand_array_fields(&PRODUCTS, &json!({"Root": {"Items": {}}}), None);
        assert_eq!(keys(&missing), ["product_1_description", "product_1_value"]);
        assert_eq!(missing[0].dot_path, "Root.Items.Product[0].Description");
        assert_eq!(missing[0].prompt, "Item 1: Product description");
        assert_eq!(missing[1].field_type, FieldType::Float);
    }

    #[test]
    fn existing_items_report_only_gaps() {
        let body = json!({"Root": {"Items": {"Product": [{"Description": "Widget"}, {}]}}});
        let missing = expand_array_fields(&PRODUCTS, &body, None);
        assert_eq!(
            keys(&missing),
            ["product_1_value", "product_2_description", "product_2_value"]
        );
    }

    #[test]
    fn item_count_is_capped() {
        let items: Vec<Value> = (0..10).map(|_| json!({})).collect();
        let body = json!({"Root": {"Items": {"Product": items}}});
        let missing = expand_array_fields(&PRODUCTS, &body, None);
        assert_eq!(missing.len(), 10);
        assert_eq!(missing.last().unwrap().flat_key, "product_5_value");
    }

    #[test]
    fn explicit_start_count_adds_placeholders() {
        let missing = expand_array_fields(&PRODUCTS, &json!({}), Some(3));
        assert_eq!(missing.len(), 6);
        assert_eq!(missing[4].flat_key, "product_3_description");
    }

    #[test]
    fn single_map_is_treated_as_list() {
        let body = json!({"Root": {"Items": {"Product": {"Description": "Widget"}}}});
        let missing = expand_array_fields(&PRODUCTS, &body, None);
        assert_eq!(keys(&missing), ["product_1_value"]);
    }

    #[test]
    fn reconstruct_skips_unanswered_items() {
        let answers: BTreeMap<String, String> = [
            ("product_1_description", "Widget"),
            ("product_1_value", "100.00"),
            ("product_3_description", "Gadget"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let items = reconstruct_array(&answers, &PRODUCTS, 3).unwrap();
        assert_eq!(
            items,
            vec![
                json!({"Description": "Widget", "Value": "100.00"}),
                json!({"Description": "Gadget"}),
            ]
        );
    }

    #[test]
    fn reconstruct_handles_nested_item_paths() {
        const NESTED: &[FieldRule] = &[
            FieldRule::new("Unit.Value", "unit_value", "Value"),
            FieldRule::new("Unit.Code", "unit_code", "Code"),
        ];
        let rule = ArrayFieldRule::new("Root.Product", "prod", NESTED);
        let answers: BTreeMap<String, String> = [("prod_1_unit_value", "100"), ("prod_1_unit_code", "PCS")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let items = reconstruct_array(&answers, &rule, 1).unwrap();
        assert_eq!(items, vec![json!({"Unit": {"Value": "100", "Code": "PCS"}})]);
    }

    #[test]
    fn reconstruct_reports_colliding_item_paths() {
        const COLLIDING: &[FieldRule] = &[
            FieldRule::new("Unit", "unit", "Unit"),
            FieldRule::new("Unit.Code", "unit_code", "Code"),
        ];
        let rule = ArrayFieldRule::new("Root.Product", "prod", COLLIDING);
        let answers: BTreeMap<String, String> = [("prod_1_unit", "each"), ("prod_1_unit_code", "PCS")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let err = reconstruct_array(&answers, &rule, 1).unwrap_err();
        assert!(matches!(
            err,
            PathError::StructuralConflict { expected: "object", found: "string", .. }
        ));
    }
}
