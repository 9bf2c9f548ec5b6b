//! Writes flat answers back into a nested request body.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::answers::Answers;
use crate::path::{self, PathError};
use crate::rules::MissingField;

/// An answer could not be placed because the body has an incompatible node
/// on the way to its path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot set '{flat_key}' at '{dot_path}': {cause}")]
pub struct RehydrationError {
    pub flat_key: String,
    pub dot_path: String,
    #[source]
    pub cause: PathError,
}

/// Return a copy of `body` with each answered field written at its dot path.
///
/// `fields` maps flat keys to paths; answers for unknown keys and blank
/// answers are ignored. Present values are never overwritten.
pub fn rehydrate(
    body: &Value,
    answers: &Answers,
    fields: &[MissingField],
) -> Result<Value, RehydrationError> {
    let paths: HashMap<&str, &str> = fields
        .iter()
        .map(|field| (field.flat_key.as_str(), field.dot_path.as_str()))
        .collect();
    let mut result = body.clone();

    for (flat_key, value) in answers {
        if value.is_empty() {
            continue;
        }
        let Some(dot_path) = paths.get(flat_key.as_str()) else {
            continue;
        };
        if path::exists(&result, dot_path) {
            continue;
        }
        path::write(&mut result, dot_path, Value::String(value.clone())).map_err(|cause| {
            RehydrationError {
                flat_key: flat_key.clone(),
                dot_path: dot_path.to_string(),
                cause,
            }
        })?;
    }
    Ok(result)
}
