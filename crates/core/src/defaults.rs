//! Three-tier defaulting: built-in values, configuration values, and the
//! conditional billing account.
//!
//! Defaults never overwrite a present value. The body is canonicalized
//! before anything is written, so `ShipmentCharge: {..}` and
//! `ShipmentCharge: [{..}]` are defaulted identically.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use thiserror::Error;

use crate::canonicalize::{canonicalize, CanonicalizeError};
use crate::domain::Domain;
use crate::evaluate::present_payers;
use crate::path::{self, PathError};

/// Configuration key holding the caller's UPS account number.
pub const ACCOUNT_NUMBER_KEY: &str = "UPS_ACCOUNT_NUMBER";

#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error(transparent)]
    Malformed(#[from] CanonicalizeError),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Per-domain default values. Paths are relative to the domain root.
#[derive(Debug, Clone, Copy)]
pub struct DefaultsTable {
    /// `(path, value)` pairs applied when the path is absent.
    pub built_in: &'static [(&'static str, &'static str)],
    /// `(path, config key)` pairs applied when the key has a non-empty value.
    pub from_config: &'static [(&'static str, &'static str)],
    /// `(path, config key)` for the billing account, applied only when the
    /// first charge names no payer object.
    pub billing: Option<(&'static str, &'static str)>,
}

/// Read-only view of configuration values.
pub trait ConfigSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

fn non_empty(config: &dyn ConfigSource, key: &str) -> Option<String> {
    config
        .lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Return a canonical copy of `body` with the domain's defaults filled in.
pub fn apply_defaults(
    domain: &Domain,
    body: &Value,
    config: &dyn ConfigSource,
) -> Result<Value, DefaultsError> {
    let mut result = canonicalize(&domain.layout, body)?;
    let table = &domain.defaults;

    for (relative, value) in table.built_in {
        let dot_path = domain.qualify(relative);
        if !path::exists(&result, &dot_path) {
            path::write(&mut result, &dot_path, Value::String(value.to_string()))?;
        }
    }

    for (relative, key) in table.from_config {
        let dot_path = domain.qualify(relative);
        if path::exists(&result, &dot_path) {
            continue;
        }
        if let Some(value) = non_empty(config, key) {
            tracing::debug!(domain = domain.name, path = %dot_path, key, "applied config default");
            path::write(&mut result, &dot_path, Value::String(value))?;
        }
    }

    if let Some((relative, key)) = table.billing {
        let dot_path = domain.qualify(relative);
        let first_charge = path::read(&result, &domain.qualify(domain.payment.first_charge));
        let has_payer = !present_payers(domain, first_charge).is_empty();
        if !has_payer && !path::exists(&result, &dot_path) {
            if let Some(account) = non_empty(config, key) {
                path::write(&mut result, &dot_path, Value::String(account))?;
            }
        }
    }

    Ok(result)
}
