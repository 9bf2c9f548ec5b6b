//! Dot/bracket path addressing over `serde_json::Value` trees.
//!
//! A path such as `Shipment.Package[0].PackageWeight.Weight` is a sequence of
//! segments separated by `.`; each segment names a map key and may carry one
//! bracketed array index.

use serde_json::{Map, Value};
use thiserror::Error;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path string itself could not be parsed.
    #[error("malformed path '{path}': {detail}")]
    Malformed { path: String, detail: String },

    /// An existing node has a different kind than the path requires.
    #[error("expected {expected} at '{at}' in path '{path}', got {found}")]
    StructuralConflict {
        path: String,
        at: String,
        expected: &'static str,
        found: &'static str,
    },
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

/// One parsed path segment: `Key` or `Key[n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub key: &'a str,
    pub index: Option<usize>,
}

pub fn parse(path: &str) -> Result<Vec<Segment<'_>>, PathError> {
    if path.is_empty() {
        return Err(malformed(path, "empty path".to_string()));
    }
    path.split('.').map(|raw| parse_segment(path, raw)).collect()
}

fn parse_segment<'a>(path: &str, raw: &'a str) -> Result<Segment<'a>, PathError> {
    if raw.is_empty() {
        return Err(malformed(path, "empty segment".to_string()));
    }
    let Some((key, rest)) = raw.split_once('[') else {
        if raw.contains(']') {
            return Err(malformed(path, format!("stray ']' in '{}'", raw)));
        }
        return Ok(Segment { key: raw, index: None });
    };
    if key.is_empty() {
        return Err(malformed(path, format!("segment '{}' has no key", raw)));
    }
    let digits = rest
        .strip_suffix(']')
        .ok_or_else(|| malformed(path, format!("unterminated index in '{}'", raw)))?;
    let index = digits
        .parse::<usize>()
        .map_err(|_| malformed(path, format!("invalid index in '{}'", raw)))?;
    Ok(Segment {
        key,
        index: Some(index),
    })
}

fn malformed(path: &str, detail: String) -> PathError {
    PathError::Malformed {
        path: path.to_string(),
        detail,
    }
}

/// JSON kind name used in conflict messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────────────────────────────────
// Reading
// ──────────────────────────────────────────────

/// Resolve `path` to the node it addresses, if every step resolves.
///
/// Unlike [`exists`], null and blank-string leaves are returned as-is.
/// A malformed path resolves to nothing.
pub fn read<'v>(tree: &'v Value, path: &str) -> Option<&'v Value> {
    let segments = parse(path).ok()?;
    let mut current = tree;
    for segment in segments {
        current = current.as_object()?.get(segment.key)?;
        if let Some(index) = segment.index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Whether a leaf value counts as supplied: not null, not a blank string.
/// `0` and `false` are present.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

pub fn exists(tree: &Value, path: &str) -> bool {
    read(tree, path).is_some_and(is_present)
}

/// Trimmed string form of a scalar at `path`, empty when absent.
pub fn read_str(tree: &Value, path: &str) -> String {
    match read(tree, path) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

// ──────────────────────────────────────────────
// Writing
// ──────────────────────────────────────────────

/// Store `value` at `path`, creating missing maps and arrays on the way.
///
/// Arrays addressed by an intermediate segment are padded with empty maps;
/// an array addressed by the final segment is padded with nulls. A null
/// intermediate node is treated as absent. Any other node of the wrong kind
/// is a [`PathError::StructuralConflict`] and the tree is left untouched
/// at that point.
pub fn write(tree: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    let segments = parse(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(malformed(path, "empty path".to_string()));
    };

    let mut current = tree;
    let mut walked = String::new();
    for segment in parents {
        let map = as_object_mut(current, &walked, path)?;
        push_key(&mut walked, segment.key);
        let slot = map.entry(segment.key.to_string()).or_insert(Value::Null);
        current = match segment.index {
            None => {
                if slot.is_null() {
                    *slot = Value::Object(Map::new());
                }
                slot
            }
            Some(index) => {
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                let items = as_array_mut(slot, &walked, path)?;
                while items.len() <= index {
                    items.push(Value::Object(Map::new()));
                }
                walked.push_str(&format!("[{}]", index));
                let item = &mut items[index];
                if item.is_null() {
                    *item = Value::Object(Map::new());
                }
                item
            }
        };
    }

    let map = as_object_mut(current, &walked, path)?;
    match last.index {
        None => {
            map.insert(last.key.to_string(), value);
        }
        Some(index) => {
            push_key(&mut walked, last.key);
            let slot = map.entry(last.key.to_string()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = as_array_mut(slot, &walked, path)?;
            while items.len() <= index {
                items.push(Value::Null);
            }
            items[index] = value;
        }
    }
    Ok(())
}

fn push_key(walked: &mut String, key: &str) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(key);
}

fn as_object_mut<'v>(
    value: &'v mut Value,
    at: &str,
    path: &str,
) -> Result<&'v mut Map<String, Value>, PathError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(conflict(path, at, "object", kind_name(other))),
    }
}

fn as_array_mut<'v>(
    value: &'v mut Value,
    at: &str,
    path: &str,
) -> Result<&'v mut Vec<Value>, PathError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(conflict(path, at, "array", kind_name(other))),
    }
}

fn conflict(path: &str, at: &str, expected: &'static str, found: &'static str) -> PathError {
    PathError::StructuralConflict {
        path: path.to_string(),
        at: if at.is_empty() {
            "<root>".to_string()
        } else {
            at.to_string()
        },
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plain_and_indexed_segments() {
        let segments = parse("Shipment.Package[2].Weight").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment { key: "Shipment", index: None },
                Segment { key: "Package", index: Some(2) },
                Segment { key: "Weight", index: None },
            ]
        );
    }

    #[test]
    fn parse_rejects_malformed_segments() {
        for bad in ["", "A..B", "A[", "A[x]", "[0]", "A]"] {
            assert!(
                matches!(parse(bad), Err(PathError::Malformed { .. })),
                "{} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn exists_treats_null_and_blank_as_absent() {
        let tree = json!({"A": {"Null": null, "Blank": "   ", "Zero": 0, "False": false, "S": "x"}});
        assert!(!exists(&tree, "A.Null"));
        assert!(!exists(&tree, "A.Blank"));
        assert!(exists(&tree, "A.Zero"));
        assert!(exists(&tree, "A.False"));
        assert!(exists(&tree, "A.S"));
        assert!(!exists(&tree, "A.Missing"));
    }

    #[test]
    fn exists_false_for_wrong_kind_or_out_of_range() {
        let tree = json!({"A": {"List": [{"B": 1}], "Str": "text"}});
        assert!(exists(&tree, "A.List[0].B"));
        assert!(!exists(&tree, "A.List[1].B"));
        assert!(!exists(&tree, "A.Str.B"));
        assert!(!exists(&tree, "A.Str[0]"));
        assert!(!exists(&tree, "A.List.B"));
    }

    #[test]
    fn write_creates_intermediates() {
        let mut tree = json!({});
        write(&mut tree, "A.B[1].C", json!("v")).unwrap();
        assert_eq!(tree, json!({"A": {"B": [{}, {"C": "v"}]}}));
    }

    #[test]
    fn write_final_index_pads_with_null() {
        let mut tree = json!({"Address": {}});
        write(&mut tree, "Address.AddressLine[1]", json!("Suite 5")).unwrap();
        assert_eq!(tree, json!({"Address": {"AddressLine": [null, "Suite 5"]}}));
    }

    #[test]
    fn write_preserves_siblings() {
        let mut tree = json!({"A": {"Keep": 1}});
        write(&mut tree, "A.New", json!(2)).unwrap();
        assert_eq!(tree, json!({"A": {"Keep": 1, "New": 2}}));
    }

    #[test]
    fn write_replaces_null_intermediate() {
        let mut tree = json!({"Shipper": {"Phone": null}});
        write(&mut tree, "Shipper.Phone.Number", json!("555")).unwrap();
        assert_eq!(tree, json!({"Shipper": {"Phone": {"Number": "555"}}}));
    }

    #[test]
    fn write_reports_conflict_for_scalar_where_map_needed() {
        let mut tree = json!({"Shipper": "ACME"});
        let err = write(&mut tree, "Shipper.Name", json!("x")).unwrap_err();
        assert_eq!(
            err,
            PathError::StructuralConflict {
                path: "Shipper.Name".into(),
                at: "Shipper".into(),
                expected: "object",
                found: "string",
            }
        );
        assert_eq!(tree, json!({"Shipper": "ACME"}));
    }

    #[test]
    fn write_reports_conflict_for_map_where_array_needed() {
        let mut tree = json!({"Package": {"Weight": "1"}});
        let err = write(&mut tree, "Package[0].Weight", json!("2")).unwrap_err();
        assert!(matches!(
            err,
            PathError::StructuralConflict { expected: "array", found: "object", .. }
        ));
    }

    #[test]
    fn write_reports_conflict_for_scalar_array_element() {
        let mut tree = json!({"Package": ["oops"]});
        let err = write(&mut tree, "Package[0].Weight", json!("2")).unwrap_err();
        assert!(
            matches!(err, PathError::StructuralConflict { ref at, .. } if at == "Package[0]")
        );
    }

    #[test]
    fn write_on_non_object_root_is_conflict() {
        let mut tree = json!([1, 2]);
        let err = write(&mut tree, "A", json!(1)).unwrap_err();
        assert!(matches!(err, PathError::StructuralConflict { ref at, .. } if at == "<root>"));
    }

    #[test]
    fn read_str_stringifies_scalars() {
        let tree = json!({"A": " US ", "N": 5, "B": true, "M": {}});
        assert_eq!(read_str(&tree, "A"), "US");
        assert_eq!(read_str(&tree, "N"), "5");
        assert_eq!(read_str(&tree, "B"), "true");
        assert_eq!(read_str(&tree, "M"), "");
        assert_eq!(read_str(&tree, "Nope"), "");
    }
}
