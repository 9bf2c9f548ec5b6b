//! Terminal outcomes of guided completion and their tool-error payloads.

use serde::Serialize;
use thiserror::Error;

use crate::canonicalize::CanonicalizeError;
use crate::defaults::DefaultsError;
use crate::evaluate::EvaluateError;
use crate::rehydrate::RehydrationError;
use crate::rules::{MissingEntry, MissingField};

/// Machine-readable error code. Serialized in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    StructuralFieldsRequired,
    ElicitationUnsupported,
    ElicitationDeclined,
    ElicitationCancelled,
    ElicitationInvalidResponse,
    ElicitationFailed,
    ElicitationMaxRetries,
    IncompleteShipment,
    MalformedRequest,
}

/// Finer-grained cause within a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Structural,
    Unsupported,
    Declined,
    Cancelled,
    ValidationErrors,
    RehydrationError,
    TransportError,
    MaxRetries,
    StillMissing,
    MalformedStructure,
    AmbiguousPayer,
}

/// A terminal outcome of completing a request body. Serializes to the stable
/// `{"code", "message", "reason", "missing"}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ElicitationError {
    pub code: ErrorCode,
    pub message: String,
    pub reason: Reason,
    pub missing: Vec<MissingEntry>,
}

fn entries(fields: &[MissingField]) -> Vec<MissingEntry> {
    fields.iter().map(MissingEntry::from).collect()
}

impl ElicitationError {
    pub fn new(
        code: ErrorCode,
        reason: Reason,
        message: impl Into<String>,
        fields: &[MissingField],
    ) -> Self {
        ElicitationError {
            code,
            message: message.into(),
            reason,
            missing: entries(fields),
        }
    }

    pub fn structural(fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::StructuralFieldsRequired,
            Reason::Structural,
            format!(
                "Missing {} structural field(s) that must be added directly to request_body \
                 (cannot be elicited via form)",
                fields.len()
            ),
            fields,
        )
    }

    pub fn unsupported(fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationUnsupported,
            Reason::Unsupported,
            format!(
                "Missing {} required field(s) and client does not support form elicitation",
                fields.len()
            ),
            fields,
        )
    }

    pub fn declined(label: &str, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationDeclined,
            Reason::Declined,
            format!("User declined to provide missing {} fields", label),
            fields,
        )
    }

    pub fn cancelled(label: &str, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationCancelled,
            Reason::Cancelled,
            format!("User cancelled {} field elicitation", label),
            fields,
        )
    }

    pub fn transport(cause: &str, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationFailed,
            Reason::TransportError,
            format!("Elicitation request failed: {}", cause),
            fields,
        )
    }

    pub fn invalid_answers(errors: &[String], fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationInvalidResponse,
            Reason::ValidationErrors,
            format!("Elicited values failed validation: {}", errors.join("; ")),
            fields,
        )
    }

    pub fn rehydration(cause: &RehydrationError, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationInvalidResponse,
            Reason::RehydrationError,
            format!("Elicited data conflicts with request structure: {}", cause),
            fields,
        )
    }

    pub fn max_retries(max_retries: usize, label: &str, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::ElicitationMaxRetries,
            Reason::MaxRetries,
            format!(
                "Maximum elicitation retries ({}) exceeded for {}",
                max_retries, label
            ),
            fields,
        )
    }

    pub fn incomplete(label: &str, fields: &[MissingField]) -> Self {
        ElicitationError::new(
            ErrorCode::IncompleteShipment,
            Reason::StillMissing,
            format!(
                "Missing {} required field(s) for {} after elicitation",
                fields.len(),
                label
            ),
            fields,
        )
    }

    /// Caller-supplied data with the wrong shape.
    pub fn malformed(cause: impl std::fmt::Display) -> Self {
        ElicitationError::new(
            ErrorCode::MalformedRequest,
            Reason::MalformedStructure,
            format!("Malformed request body: {}", cause),
            &[],
        )
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "reason": self.reason,
            "missing": self.missing,
        })
    }
}

impl From<CanonicalizeError> for ElicitationError {
    fn from(err: CanonicalizeError) -> Self {
        ElicitationError::malformed(err)
    }
}

impl From<DefaultsError> for ElicitationError {
    fn from(err: DefaultsError) -> Self {
        ElicitationError::malformed(err)
    }
}

impl From<EvaluateError> for ElicitationError {
    fn from(err: EvaluateError) -> Self {
        match &err {
            EvaluateError::AmbiguousPayer { .. } => ElicitationError::new(
                ErrorCode::MalformedRequest,
                Reason::AmbiguousPayer,
                err.to_string(),
                &[],
            ),
            EvaluateError::Malformed(inner) => ElicitationError::malformed(inner),
        }
    }
}
