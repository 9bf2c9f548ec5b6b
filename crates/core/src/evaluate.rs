//! Requirement evaluation: walks a request body against a [`Domain`]'s rule
//! tables and reports every required field that is absent.
//!
//! Evaluation order is fixed: unconditional rules, mode-conditional groups,
//! the charge-type rule, the payer check, per-package rules, country-conditional
//! address rules, then the domain's conditional groups. The returned list keeps
//! that order, which is also the order fields appear in the elicitation form.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::canonicalize::{canonicalize, CanonicalizeError};
use crate::domain::Domain;
use crate::path;
use crate::rules::{FieldRule, MissingField};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluateError {
    /// More than one mutually exclusive payer object on the same charge.
    #[error(
        "Ambiguous payer: multiple billing objects present ({}). Only one of {} is allowed per charge.",
        .present.join(", "),
        .allowed.join(", ")
    )]
    AmbiguousPayer {
        present: Vec<String>,
        allowed: Vec<String>,
    },

    #[error(transparent)]
    Malformed(#[from] CanonicalizeError),
}

// ──────────────────────────────────────────────
// Mode and facts
// ──────────────────────────────────────────────

/// Caller-selected request mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationMode {
    /// Rating request option (`Rate`, `Shop`, ...). `None` for domains without one.
    pub request_option: Option<String>,
}

impl EvaluationMode {
    pub fn with_request_option(option: impl Into<String>) -> Self {
        EvaluationMode {
            request_option: Some(option.into()),
        }
    }

    /// Shop modes return every service's rate, so no service code is needed.
    pub fn is_shop(&self) -> bool {
        self.request_option.as_deref().is_some_and(|option| {
            option.eq_ignore_ascii_case("shop") || option.eq_ignore_ascii_case("shoptimeintransit")
        })
    }
}

/// Member states of the European Union, for the EU-to-EU exemption.
pub const EU_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT", "LV",
    "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Values computed once per evaluation and shared by every conditional group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentFacts {
    /// ShipFrom country when present, otherwise Shipper country.
    pub origin: String,
    pub destination: String,
    pub service_code: String,
    /// `Packaging.Code` per package; one entry per placeholder when absent.
    pub packaging_codes: Vec<String>,
    pub is_return: bool,
    pub shop: bool,
}

impl ShipmentFacts {
    pub fn gather(domain: &Domain, body: &Value, mode: &EvaluationMode) -> Self {
        let shipment = domain.qualify("Shipment");
        let country = |role: &str| {
            path::read_str(body, &format!("{}.{}.Address.CountryCode", shipment, role))
                .to_uppercase()
        };
        let ship_from = country("ShipFrom");
        let origin = if ship_from.is_empty() {
            country("Shipper")
        } else {
            ship_from
        };
        let packaging_codes = packages(domain, body)
            .iter()
            .map(|package| path::read_str(package, "Packaging.Code"))
            .collect();
        ShipmentFacts {
            origin,
            destination: country("ShipTo"),
            service_code: path::read_str(body, &format!("{}.Service.Code", shipment)),
            packaging_codes,
            is_return: path::read(body, &shipment).is_some_and(domain.is_return),
            shop: mode.is_shop(),
        }
    }

    /// Both ends known and different.
    pub fn is_international(&self) -> bool {
        !self.origin.is_empty() && !self.destination.is_empty() && self.origin != self.destination
    }

    /// Every package is a UPS Letter (packaging `01`).
    pub fn all_letters(&self) -> bool {
        !self.packaging_codes.is_empty() && self.packaging_codes.iter().all(|code| code == "01")
    }

    /// EU origin and destination with UPS Standard (service `11`).
    pub fn eu_standard(&self) -> bool {
        EU_COUNTRIES.contains(&self.origin.as_str())
            && EU_COUNTRIES.contains(&self.destination.as_str())
            && self.service_code == "11"
    }

    /// International shipments that still need customs paperwork.
    pub fn needs_customs_documents(&self) -> bool {
        self.is_international() && !self.all_letters() && !self.eu_standard()
    }
}

// ──────────────────────────────────────────────
// Conditional groups
// ──────────────────────────────────────────────

pub type Predicate = fn(&ShipmentFacts) -> bool;
pub type Emitter = fn(&Domain, &Value, &ShipmentFacts) -> Vec<MissingField>;

/// What a conditional group does when its predicate holds.
#[derive(Debug, Clone, Copy)]
pub enum GroupAction {
    /// Require each rule (paths relative to the domain root).
    Require(&'static [FieldRule]),
    /// Run a custom emitter for checks that are not plain presence rules.
    Emit(Emitter),
}

/// A predicate-guarded set of requirements. Domains register these instead of
/// extending the evaluation loop.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalGroup {
    pub name: &'static str,
    pub applies: Predicate,
    pub action: GroupAction,
}

// ──────────────────────────────────────────────
// Evaluation
// ──────────────────────────────────────────────

/// Report every required field absent from `body`.
///
/// The body is canonicalized first; the caller's value is not modified.
pub fn find_missing(
    domain: &Domain,
    body: &Value,
    mode: &EvaluationMode,
) -> Result<Vec<MissingField>, EvaluateError> {
    let body = canonicalize(&domain.layout, body)?;
    let facts = ShipmentFacts::gather(domain, &body, mode);
    let mut missing = Vec::new();

    for rules in domain.unconditional {
        missing.extend(require(domain, &body, rules));
    }
    for group in domain.mode_groups {
        apply_group(domain, &body, &facts, group, &mut missing);
    }

    missing.extend(require(
        domain,
        &body,
        std::slice::from_ref(&domain.payment.charge_type),
    ));
    check_payer(domain, &body, &mut missing)?;

    check_packages(domain, &body, &mut missing);
    check_addresses(domain, &body, &mut missing);

    for group in domain.conditional {
        apply_group(domain, &body, &facts, group, &mut missing);
    }

    Ok(missing)
}

/// The package collection of a canonical body, or one empty placeholder.
pub fn packages(domain: &Domain, body: &Value) -> Vec<Value> {
    match path::read(body, &domain.qualify(domain.package_collection)) {
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        Some(item @ Value::Object(_)) => vec![item.clone()],
        _ => vec![Value::Object(Map::new())],
    }
}

/// Root-qualified missing fields for each rule in `rules` absent from `body`.
pub fn require(domain: &Domain, body: &Value, rules: &[FieldRule]) -> Vec<MissingField> {
    rules
        .iter()
        .filter_map(|rule| {
            let dot_path = domain.qualify(rule.path);
            (!path::exists(body, &dot_path)).then(|| rule.missing_at(dot_path, rule.key, rule.prompt))
        })
        .collect()
}

fn apply_group(
    domain: &Domain,
    body: &Value,
    facts: &ShipmentFacts,
    group: &ConditionalGroup,
    missing: &mut Vec<MissingField>,
) {
    if !(group.applies)(facts) {
        return;
    }
    match group.action {
        GroupAction::Require(rules) => missing.extend(require(domain, body, rules)),
        GroupAction::Emit(emit) => missing.extend(emit(domain, body, facts)),
    }
}

/// Payer keys present (even with an empty value) on a charge.
pub fn present_payers<'d>(domain: &'d Domain, charge: Option<&Value>) -> Vec<&'d str> {
    let Some(Value::Object(charge)) = charge else {
        return Vec::new();
    };
    domain
        .payment
        .payers
        .iter()
        .map(|payer| payer.key)
        .filter(|key| charge.contains_key(*key))
        .collect()
}

fn check_payer(
    domain: &Domain,
    body: &Value,
    missing: &mut Vec<MissingField>,
) -> Result<(), EvaluateError> {
    let first_charge = path::read(body, &domain.qualify(domain.payment.first_charge));
    let present = present_payers(domain, first_charge);
    if present.len() > 1 {
        return Err(EvaluateError::AmbiguousPayer {
            present: present.iter().map(|key| key.to_string()).collect(),
            allowed: domain.payment.payers.iter().map(|p| p.key.to_string()).collect(),
        });
    }

    let payers = domain.payment.payers;
    let chosen = match present.first() {
        Some(key) => payers.iter().find(|payer| payer.key == *key),
        None => payers.first(),
    };
    if let Some(payer) = chosen {
        missing.extend(require(domain, body, std::slice::from_ref(&payer.account)));
    }
    Ok(())
}

fn check_packages(domain: &Domain, body: &Value, missing: &mut Vec<MissingField>) {
    let packages = packages(domain, body);
    let indexed_prompts = packages.len() > 1;
    for (i, package) in packages.iter().enumerate() {
        let n = i + 1;
        for rule in domain.package_rules {
            if path::exists(package, rule.path) {
                continue;
            }
            let prompt = if indexed_prompts {
                format!("Package {}: {}", n, rule.prompt)
            } else {
                rule.prompt.to_string()
            };
            missing.push(rule.missing_at(
                format!("{}[{}].{}", domain.qualify(domain.package_collection), i, rule.path),
                format!("package_{}_{}", n, rule.key),
                prompt,
            ));
        }
    }
}

fn check_addresses(domain: &Domain, body: &Value, missing: &mut Vec<MissingField>) {
    for role in domain.address_roles {
        let address_path = domain.qualify(&format!("{}.Address", role.node));
        let Some(address @ Value::Object(_)) = path::read(body, &address_path) else {
            continue;
        };
        let country = path::read_str(address, "CountryCode").to_uppercase();
        for group in domain.country_groups {
            if !group.countries.contains(&country.as_str()) {
                continue;
            }
            for rule in group.rules {
                if path::exists(address, rule.path) {
                    continue;
                }
                missing.push(rule.missing_at(
                    format!("{}.{}", address_path, rule.path),
                    format!("{}_{}", role.key_prefix, rule.key),
                    format!("{} {}", role.label, rule.prompt.to_lowercase()),
                ));
            }
        }
    }
}
