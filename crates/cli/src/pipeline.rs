//! Request-body preparation shared by the tool server and the offline
//! subcommands: canonicalize, apply defaults, find what is still missing and,
//! when a prompt transport is available, fill the gaps interactively.

use parcelkit_core::domain::Domain;
use parcelkit_core::{
    apply_defaults, canonicalize, elicit_and_rehydrate, find_missing, CompletionOptions,
    ConfigSource, ElicitationError, Elicitor, EvaluationMode, MissingField,
};
use serde_json::Value;

/// A defaulted body and the fields it still lacks.
#[derive(Debug)]
pub struct Discovery {
    pub body: Value,
    pub missing: Vec<MissingField>,
}

/// Canonicalize, default and evaluate `body` without prompting.
pub fn discover(
    domain: &Domain,
    body: &Value,
    mode: &EvaluationMode,
    config: &dyn ConfigSource,
) -> Result<Discovery, ElicitationError> {
    let canonical = canonicalize(&domain.layout, body)?;
    let body = apply_defaults(domain, &canonical, config)?;
    let missing = find_missing(domain, &body, mode)?;
    tracing::debug!(
        domain = domain.name,
        missing = missing.len(),
        "requirements evaluated"
    );
    Ok(Discovery { body, missing })
}

/// Returns a body with no missing fields, prompting through `elicitor` if
/// needed.
pub async fn complete(
    domain: &'static Domain,
    body: &Value,
    mode: &EvaluationMode,
    config: &dyn ConfigSource,
    elicitor: &dyn Elicitor,
) -> Result<Value, ElicitationError> {
    let Discovery { body, missing } = discover(domain, body, mode, config)?;
    if missing.is_empty() {
        return Ok(body);
    }

    tracing::info!(
        domain = domain.name,
        missing = missing.len(),
        "request body incomplete, eliciting"
    );
    let finder = |candidate: &Value| -> Result<Vec<MissingField>, ElicitationError> {
        Ok(find_missing(domain, candidate, mode)?)
    };
    let recanonicalize = |candidate: &Value| canonicalize(&domain.layout, candidate);
    let options = CompletionOptions::new(domain.label).with_canonicalizer(&recanonicalize);
    let body = elicit_and_rehydrate(elicitor, body, missing, &finder, &options).await?;

    let still_missing = find_missing(domain, &body, mode)?;
    if !still_missing.is_empty() {
        return Err(ElicitationError::incomplete(domain.label, &still_missing));
    }
    Ok(body)
}
