//! Operation metadata read from OpenAPI 3 documents.
//!
//! Documents may be JSON or YAML; both are read through `serde_yaml` into a
//! `serde_json::Value` and walked the same way. Only the fields the tool layer
//! needs are kept: method, path template, parameters with their defaults, and
//! whether a request body is required.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::RegistryError;

/// OpenAPI documents expected in a configured specs directory.
pub const DEFAULT_SPEC_FILES: &[&str] = &[
    "Rating.yaml",
    "Shipping.yaml",
    "TimeInTransit.yaml",
    "LandedCost.yaml",
    "Paperless.yaml",
    "Locator.yaml",
    "Pickup.yaml",
];

const EMBEDDED_SOURCE: &str = "operations.yaml";
const EMBEDDED_DOCUMENT: &str = include_str!("operations.yaml");

const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// `schema.default`, when declared.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub source_file: String,
    pub operation_id: String,
    /// Uppercase HTTP method.
    pub method: String,
    pub path: String,
    pub deprecated: bool,
    pub summary: String,
    pub request_body_required: bool,
    pub path_params: Vec<ParameterSpec>,
    pub query_params: Vec<ParameterSpec>,
    pub header_params: Vec<ParameterSpec>,
}

impl OperationSpec {
    /// Declared defaults of path parameters, keyed by name.
    pub fn default_path_values(&self) -> Map<String, Value> {
        self.path_params
            .iter()
            .filter_map(|param| {
                param
                    .default
                    .clone()
                    .filter(|value| !value.is_null())
                    .map(|value| (param.name.clone(), value))
            })
            .collect()
    }
}

/// Operations keyed by `operationId`.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, OperationSpec>,
}

impl OperationRegistry {
    /// Builds a registry from `(source name, document text)` pairs.
    pub fn from_documents<'a>(
        documents: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RegistryError> {
        let mut registry = OperationRegistry::default();
        for (source_file, text) in documents {
            let doc: Value = serde_yaml::from_str(text).map_err(|e| RegistryError::Parse {
                source_file: source_file.to_string(),
                detail: e.to_string(),
            })?;
            registry.add_document(source_file, &doc)?;
        }
        Ok(registry)
    }

    /// The operations the tool surface uses, compiled into the binary.
    pub fn embedded() -> Result<Self, RegistryError> {
        OperationRegistry::from_documents([(EMBEDDED_SOURCE, EMBEDDED_DOCUMENT)])
    }

    /// Loads every file in [`DEFAULT_SPEC_FILES`] from `dir`. All missing files
    /// are reported together.
    pub fn from_dir(dir: &Path) -> Result<Self, RegistryError> {
        let missing: Vec<String> = DEFAULT_SPEC_FILES
            .iter()
            .filter(|name| !dir.join(name).is_file())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RegistryError::MissingSpecs {
                dir: dir.to_path_buf(),
                missing,
                required: DEFAULT_SPEC_FILES.iter().map(|s| s.to_string()).collect(),
            });
        }

        let mut texts = Vec::with_capacity(DEFAULT_SPEC_FILES.len());
        for name in DEFAULT_SPEC_FILES {
            let path = dir.join(name);
            let text = std::fs::read_to_string(&path)
                .map_err(|source| RegistryError::Io { path, source })?;
            texts.push((*name, text));
        }
        OperationRegistry::from_documents(texts.iter().map(|(name, text)| (*name, text.as_str())))
    }

    fn add_document(&mut self, source_file: &str, doc: &Value) -> Result<(), RegistryError> {
        let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
            return Ok(());
        };

        for (path, path_item) in paths {
            let Some(path_obj) = path_item.as_object() else {
                continue;
            };
            for (method, operation) in path_obj {
                let method = method.to_ascii_lowercase();
                if !HTTP_METHODS.contains(&method.as_str()) {
                    continue;
                }
                let spec = parse_operation(source_file, &method.to_ascii_uppercase(), path, operation);
                if self.operations.contains_key(&spec.operation_id) {
                    return Err(RegistryError::Duplicate(spec.operation_id));
                }
                self.operations.insert(spec.operation_id.clone(), spec);
            }
        }
        Ok(())
    }

    pub fn get_operation(&self, operation_id: &str) -> Result<&OperationSpec, RegistryError> {
        self.operations
            .get(operation_id)
            .ok_or_else(|| RegistryError::NotFound(operation_id.to_string()))
    }

    /// Operations sorted by id.
    pub fn list_operations(&self, include_deprecated: bool) -> Vec<&OperationSpec> {
        self.operations
            .values()
            .filter(|op| include_deprecated || !op.deprecated)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn parse_operation(source_file: &str, method: &str, path: &str, operation: &Value) -> OperationSpec {
    let operation_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", method, path));

    let mut path_params = Vec::new();
    let mut query_params = Vec::new();
    let mut header_params = Vec::new();
    let parameters = operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for param in parameters {
        let location = match param.get("in").and_then(Value::as_str) {
            Some("path") => ParameterLocation::Path,
            Some("query") => ParameterLocation::Query,
            Some("header") => ParameterLocation::Header,
            _ => continue,
        };
        let spec = ParameterSpec {
            name: param
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            location,
            required: param.get("required").and_then(Value::as_bool).unwrap_or(false),
            default: param.get("schema").and_then(|s| s.get("default")).cloned(),
        };
        match location {
            ParameterLocation::Path => path_params.push(spec),
            ParameterLocation::Query => query_params.push(spec),
            ParameterLocation::Header => header_params.push(spec),
        }
    }

    OperationSpec {
        source_file: source_file.to_string(),
        operation_id,
        method: method.to_string(),
        path: path.to_string(),
        deprecated: operation
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        summary: operation
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        request_body_required: operation
            .get("requestBody")
            .and_then(|body| body.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        path_params,
        query_params,
        header_params,
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
