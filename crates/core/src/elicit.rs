//! Interactive completion of a request body.
//!
//! [`elicit_and_rehydrate`] drives the prompt loop: structural fields end the
//! run before any prompt, answers are normalized and validated, valid answers
//! are written into the body, and the body is re-evaluated until nothing is
//! missing or the retry budget runs out.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::answers::{self, Answers};
use crate::canonicalize::CanonicalizeError;
use crate::error::ElicitationError;
use crate::rehydrate::rehydrate;
use crate::rules::{partition, MissingField};
use crate::schema::{FormSchemaBuilder, SchemaBuilder};

// ──────────────────────────────────────────────
// Transport seam
// ──────────────────────────────────────────────

/// The user's reply to one prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ElicitationResponse {
    Accepted(Map<String, Value>),
    Declined,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ElicitorError {
    /// The prompt could not be delivered or answered.
    #[error("{0}")]
    Transport(String),

    /// Already a terminal outcome; propagated unchanged.
    #[error(transparent)]
    Elicitation(#[from] ElicitationError),
}

/// Something that can put a form in front of the user.
#[async_trait]
pub trait Elicitor: Send + Sync {
    /// Whether the connected client can render form prompts.
    fn supports_form(&self) -> bool;

    async fn elicit(
        &self,
        message: &str,
        schema: &Value,
    ) -> Result<ElicitationResponse, ElicitorError>;
}

/// Form support as advertised in a client's `capabilities` object.
///
/// `elicitation.form` means yes; an empty `elicitation` object predates the
/// form/url split and also means yes; `url` alone means no.
pub fn supports_form(capabilities: &Value) -> bool {
    let Some(Value::Object(elicitation)) = capabilities.get("elicitation") else {
        return false;
    };
    let declared = |key: &str| elicitation.get(key).is_some_and(|v| !v.is_null());
    declared("form") || !declared("url")
}

// ──────────────────────────────────────────────
// Options and session
// ──────────────────────────────────────────────

pub type Canonicalizer = dyn Fn(&Value) -> Result<Value, CanonicalizeError> + Send + Sync;

pub const DEFAULT_MAX_RETRIES: usize = 3;

static FORM_SCHEMA: FormSchemaBuilder = FormSchemaBuilder::DEFAULT;

pub struct CompletionOptions<'a> {
    /// Human label used in messages ("shipment creation").
    pub label: &'a str,
    /// Prompt attempts before giving up.
    pub max_retries: usize,
    pub schema_builder: &'a dyn SchemaBuilder,
    /// Applied to the body before each rehydration.
    pub canonicalize: Option<&'a Canonicalizer>,
}

impl<'a> CompletionOptions<'a> {
    pub fn new(label: &'a str) -> Self {
        CompletionOptions {
            label,
            max_retries: DEFAULT_MAX_RETRIES,
            schema_builder: &FORM_SCHEMA,
            canonicalize: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_schema_builder(mut self, builder: &'a dyn SchemaBuilder) -> Self {
        self.schema_builder = builder;
        self
    }

    pub fn with_canonicalizer(mut self, canonicalize: &'a Canonicalizer) -> Self {
        self.canonicalize = Some(canonicalize);
        self
    }
}

/// Working state carried between prompt attempts.
#[derive(Debug, Clone)]
pub struct ElicitationSession {
    pub body: Value,
    /// Fields the next prompt asks for.
    pub elicitable: Vec<MissingField>,
    /// Prompts sent so far.
    pub attempt: usize,
    pub message: String,
    pub base_message: String,
}

impl ElicitationSession {
    pub fn new(body: Value, elicitable: Vec<MissingField>, label: &str) -> Self {
        let base_message = base_message(elicitable.len(), label);
        ElicitationSession {
            body,
            elicitable,
            attempt: 0,
            message: base_message.clone(),
            base_message,
        }
    }

    /// Same fields again, with the problems listed first.
    pub fn retry_with_errors(&mut self, errors: &[String]) {
        self.message = format!(
            "Please correct the following:\n{}\n\n{}",
            bullets(errors.iter().map(String::as_str)),
            self.base_message
        );
    }

    /// Move on to a smaller field set after a partial answer.
    pub fn advance(&mut self, body: Value, still_missing: Vec<MissingField>, label: &str) {
        self.base_message = base_message(still_missing.len(), label);
        self.message = format!(
            "Still missing after elicitation:\n{}\n\n{}",
            bullets(still_missing.iter().map(|field| field.prompt.as_str())),
            self.base_message
        );
        self.body = body;
        self.elicitable = still_missing;
    }
}

fn base_message(count: usize, label: &str) -> String {
    format!("Missing {} required field(s) for {}.", count, label)
}

fn bullets<'s>(lines: impl Iterator<Item = &'s str>) -> String {
    lines
        .map(|line| format!("- {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten accepted form content to answer strings. Nulls are dropped.
pub fn answers_from_content(content: &Map<String, Value>) -> Answers {
    content
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

// ──────────────────────────────────────────────
// Orchestration
// ──────────────────────────────────────────────

/// Collect `missing` from the user and return the completed body.
///
/// `find_missing` re-evaluates the body after each round of answers.
pub async fn elicit_and_rehydrate(
    elicitor: &dyn Elicitor,
    body: Value,
    missing: Vec<MissingField>,
    find_missing: &(dyn Fn(&Value) -> Result<Vec<MissingField>, ElicitationError> + Send + Sync),
    options: &CompletionOptions<'_>,
) -> Result<Value, ElicitationError> {
    let (elicitable, structural) = partition(missing);
    if !structural.is_empty() {
        return Err(ElicitationError::structural(&structural));
    }
    if elicitable.is_empty() {
        return Ok(body);
    }
    if !elicitor.supports_form() {
        return Err(ElicitationError::unsupported(&elicitable));
    }

    let label = options.label;
    let mut session = ElicitationSession::new(body, elicitable, label);
    let mut schema = options.schema_builder.build(&session.elicitable);

    while session.attempt < options.max_retries {
        session.attempt += 1;
        tracing::debug!(
            label,
            attempt = session.attempt,
            fields = session.elicitable.len(),
            "prompting for missing fields"
        );

        let response = match elicitor.elicit(&session.message, &schema).await {
            Ok(response) => response,
            Err(ElicitorError::Elicitation(err)) => return Err(err),
            Err(ElicitorError::Transport(cause)) => {
                tracing::warn!(label, %cause, "elicitation transport failed");
                return Err(ElicitationError::transport(&cause, &session.elicitable));
            }
        };

        let content = match response {
            ElicitationResponse::Accepted(content) => content,
            ElicitationResponse::Declined => {
                tracing::info!(label, "elicitation declined");
                return Err(ElicitationError::declined(label, &session.elicitable));
            }
            ElicitationResponse::Cancelled => {
                tracing::info!(label, "elicitation cancelled");
                return Err(ElicitationError::cancelled(label, &session.elicitable));
            }
        };

        let normalized = answers::normalize(&answers_from_content(&content));
        let errors = answers::validate(&normalized, &session.elicitable);
        if !errors.is_empty() {
            tracing::debug!(label, errors = errors.len(), "answers failed validation");
            if options.max_retries == 1 {
                return Err(ElicitationError::invalid_answers(&errors, &session.elicitable));
            }
            session.retry_with_errors(&errors);
            continue;
        }

        let base = match options.canonicalize {
            Some(canonicalize) => canonicalize(&session.body)?,
            None => session.body.clone(),
        };
        let updated = rehydrate(&base, &normalized, &session.elicitable)
            .map_err(|err| ElicitationError::rehydration(&err, &session.elicitable))?;

        let still_missing = find_missing(&updated)?;
        if still_missing.is_empty() {
            tracing::info!(label, attempts = session.attempt, "request body completed");
            return Ok(updated);
        }

        let (elicitable, structural) = partition(still_missing);
        if !structural.is_empty() {
            return Err(ElicitationError::structural(&structural));
        }
        session.advance(updated, elicitable, label);
        schema = options.schema_builder.build(&session.elicitable);
    }

    tracing::warn!(label, max_retries = options.max_retries, "elicitation retries exhausted");
    Err(ElicitationError::max_retries(
        options.max_retries,
        label,
        &session.elicitable,
    ))
}
