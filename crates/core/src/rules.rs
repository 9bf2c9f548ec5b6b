//! Declarative field-requirement rules and the missing-field records derived
//! from them.
//!
//! Rule tables are `const` data authored once per domain. Paths in a domain's
//! tables are relative to the domain's root wrapper (e.g. `Shipment.Shipper.Name`
//! under `ShipmentRequest`); per-item rules are relative to the item.

use serde::Serialize;

// ──────────────────────────────────────────────
// Field metadata
// ──────────────────────────────────────────────

/// Scalar type collected for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
}

impl FieldType {
    /// JSON Schema `type` keyword for this field type.
    pub fn schema_type(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

/// Value of a single constraint (`("maxLength", Int(2))`, `("pattern", Text(..))`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstraintValue {
    Int(i64),
    Float(f64),
    Text(&'static str),
    Flag(bool),
}

impl From<ConstraintValue> for serde_json::Value {
    fn from(value: ConstraintValue) -> Self {
        match value {
            ConstraintValue::Int(n) => n.into(),
            ConstraintValue::Float(f) => f.into(),
            ConstraintValue::Text(s) => s.into(),
            ConstraintValue::Flag(b) => b.into(),
        }
    }
}

pub type Constraint = (&'static str, ConstraintValue);

/// A required field: where it lives, how to ask for it, how to type it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub path: &'static str,
    pub key: &'static str,
    pub prompt: &'static str,
    pub field_type: FieldType,
    /// Closed set of accepted codes; empty when unconstrained.
    pub enum_values: &'static [&'static str],
    /// Display labels paired index-for-index with `enum_values`.
    pub enum_titles: &'static [&'static str],
    pub default: Option<&'static str>,
    /// Ordered constraint pairs forwarded to the form schema.
    pub constraints: &'static [Constraint],
}

impl FieldRule {
    pub const fn new(path: &'static str, key: &'static str, prompt: &'static str) -> Self {
        FieldRule {
            path,
            key,
            prompt,
            field_type: FieldType::String,
            enum_values: &[],
            enum_titles: &[],
            default: None,
            constraints: &[],
        }
    }

    pub const fn typed(self, field_type: FieldType) -> Self {
        FieldRule { field_type, ..self }
    }

    pub const fn one_of(
        self,
        enum_values: &'static [&'static str],
        enum_titles: &'static [&'static str],
    ) -> Self {
        FieldRule {
            enum_values,
            enum_titles,
            ..self
        }
    }

    pub const fn with_default(self, default: &'static str) -> Self {
        FieldRule {
            default: Some(default),
            ..self
        }
    }

    pub const fn constrained(self, constraints: &'static [Constraint]) -> Self {
        FieldRule {
            constraints,
            ..self
        }
    }

    /// Resolve this rule into a missing-field record with its own path/key/prompt.
    pub fn missing(&self) -> MissingField {
        self.missing_at(self.path, self.key, self.prompt)
    }

    /// Resolve this rule with overridden path, key and prompt (indexed items,
    /// role-prefixed addresses, root-qualified paths).
    pub fn missing_at(
        &self,
        dot_path: impl Into<String>,
        flat_key: impl Into<String>,
        prompt: impl Into<String>,
    ) -> MissingField {
        MissingField {
            dot_path: dot_path.into(),
            flat_key: flat_key.into(),
            prompt: prompt.into(),
            field_type: self.field_type,
            enum_values: self.enum_values,
            enum_titles: self.enum_titles,
            default: self.default,
            constraints: self.constraints,
            elicitable: true,
        }
    }
}

// ──────────────────────────────────────────────
// Missing fields
// ──────────────────────────────────────────────

/// A rule resolved against a concrete body and found absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    pub dot_path: String,
    pub flat_key: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub enum_values: &'static [&'static str],
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub enum_titles: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    #[serde(skip_serializing_if = "is_empty_slice")]
    pub constraints: &'static [Constraint],
    /// False when the value must be a nested object/array the flat form
    /// cannot carry; the caller has to edit the body directly.
    pub elicitable: bool,
}

impl MissingField {
    /// A plain elicitable string field with no extra metadata.
    pub fn new(
        dot_path: impl Into<String>,
        flat_key: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        MissingField {
            dot_path: dot_path.into(),
            flat_key: flat_key.into(),
            prompt: prompt.into(),
            field_type: FieldType::String,
            enum_values: &[],
            enum_titles: &[],
            default: None,
            constraints: &[],
            elicitable: true,
        }
    }

    /// A structural field whose prompt carries guidance for editing the body.
    pub fn structural(
        dot_path: impl Into<String>,
        flat_key: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        MissingField {
            elicitable: false,
            ..MissingField::new(dot_path, flat_key, prompt)
        }
    }
}

fn is_empty_slice<T>(items: &&[T]) -> bool {
    items.is_empty()
}

/// The `{dot_path, flat_key, prompt}` triple reported in error payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEntry {
    pub dot_path: String,
    pub flat_key: String,
    pub prompt: String,
}

impl From<&MissingField> for MissingEntry {
    fn from(field: &MissingField) -> Self {
        MissingEntry {
            dot_path: field.dot_path.clone(),
            flat_key: field.flat_key.clone(),
            prompt: field.prompt.clone(),
        }
    }
}

/// Split a missing list into `(elicitable, structural)`, preserving order.
pub fn partition(missing: Vec<MissingField>) -> (Vec<MissingField>, Vec<MissingField>) {
    missing.into_iter().partition(|field| field.elicitable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHT: FieldRule = FieldRule::new("PackageWeight.Weight", "weight", "Package weight")
        .typed(FieldType::Float)
        .constrained(&[("gt", ConstraintValue::Int(0))]);

    #[test]
    fn const_builders_compose() {
        assert_eq!(WEIGHT.field_type, FieldType::Float);
        assert_eq!(WEIGHT.constraints, &[("gt", ConstraintValue::Int(0))]);
        assert!(WEIGHT.enum_values.is_empty());
        assert_eq!(WEIGHT.default, None);
    }

    #[test]
    fn missing_at_keeps_metadata() {
        let field = WEIGHT.missing_at(
            "ShipmentRequest.Shipment.Package[1].PackageWeight.Weight",
            "package_2_weight",
            "Package 2: Package weight",
        );
        assert_eq!(field.flat_key, "package_2_weight");
        assert_eq!(field.field_type, FieldType::Float);
        assert_eq!(field.constraints.len(), 1);
        assert!(field.elicitable);
    }

    #[test]
    fn structural_fields_are_not_elicitable() {
        let field = MissingField::structural("A.B", "b_required", "Add B");
        assert!(!field.elicitable);
    }

    #[test]
    fn partition_preserves_order() {
        let missing = vec![
            MissingField::new("A", "a", "A"),
            MissingField::structural("B", "b", "B"),
            MissingField::new("C", "c", "C"),
        ];
        let (elicitable, structural) = partition(missing);
        let keys: Vec<_> = elicitable.iter().map(|f| f.flat_key.as_str()).collect();
        assert_eq!(keys, ["a", "c"]);
        assert_eq!(structural[0].flat_key, "b");
    }

    #[test]
    fn entry_serializes_three_fields() {
        let entry = MissingEntry::from(&WEIGHT.missing());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dot_path": "PackageWeight.Weight",
                "flat_key": "weight",
                "prompt": "Package weight",
            })
        );
    }
}
