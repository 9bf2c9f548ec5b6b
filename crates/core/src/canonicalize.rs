//! Normalizes "object or array" substructures into arrays.
//!
//! Provider payloads accept `Package: {..}` and `Package: [{..}]` alike. Every
//! later stage assumes the array form, so requests are canonicalized once up
//! front and the canonical copy is what gets evaluated, defaulted and sent.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::path::kind_name;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    #[error("expected object at '{path}', got {found}")]
    StructuralType { path: String, found: &'static str },
}

/// Where a domain's structural anchors and singular-or-list keys live.
///
/// Paths are dot paths without indices, relative to the `root` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalLayout {
    pub root: &'static str,
    /// Nodes that must be maps when present, outermost first.
    pub anchors: &'static [&'static str],
    /// Keys normalized to arrays of maps.
    pub list_fields: &'static [&'static str],
}

/// Return a canonical deep copy of `body`.
///
/// For each list field: a map is wrapped into a one-element array, non-map
/// array elements become `{}`, an empty array becomes `[{}]` and any other
/// scalar becomes `[{}]`. Absent keys stay absent. Idempotent.
pub fn canonicalize(layout: &CanonicalLayout, body: &Value) -> Result<Value, CanonicalizeError> {
    let mut result = body.clone();
    let Value::Object(root_map) = &result else {
        return Err(CanonicalizeError::StructuralType {
            path: "request body root".to_string(),
            found: kind_name(&result),
        });
    };

    match root_map.get(layout.root) {
        None | Some(Value::Null) => return Ok(result),
        Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(CanonicalizeError::StructuralType {
                path: layout.root.to_string(),
                found: kind_name(other),
            })
        }
    }

    for anchor in layout.anchors {
        let full = format!("{}.{}", layout.root, anchor);
        match result.pointer(&pointer(&full)) {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(other) => {
                return Err(CanonicalizeError::StructuralType {
                    path: full,
                    found: kind_name(other),
                })
            }
        }
    }

    for field in layout.list_fields {
        let full = format!("{}.{}", layout.root, field);
        let (parent, key) = full.rsplit_once('.').unwrap_or(("", full.as_str()));
        if let Some(Value::Object(container)) = result.pointer_mut(&pointer(parent)) {
            normalize_list_field(container, key);
        }
    }

    Ok(result)
}

fn normalize_list_field(container: &mut Map<String, Value>, key: &str) {
    let Some(value) = container.get_mut(key) else {
        return;
    };
    let normalized = match value.take() {
        item @ Value::Object(_) => vec![item],
        Value::Array(items) if items.is_empty() => vec![empty_map()],
        Value::Array(items) => items
            .into_iter()
            .map(|item| if item.is_object() { item } else { empty_map() })
            .collect(),
        _ => vec![empty_map()],
    };
    *value = Value::Array(normalized);
}

fn empty_map() -> Value {
    Value::Object(Map::new())
}

fn pointer(dot_path: &str) -> String {
    if dot_path.is_empty() {
        return String::new();
    }
    format!("/{}", dot_path.replace('.', "/"))
}
