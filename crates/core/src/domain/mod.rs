//! Per-operation rule tables.
//!
//! A [`Domain`] is plain data: the evaluator, defaults applier and
//! canonicalizer are shared, and each operation contributes its rule tables
//! and conditional groups.

pub mod common;
pub mod rating;
pub mod shipment;

use serde_json::Value;

use crate::canonicalize::CanonicalLayout;
use crate::defaults::DefaultsTable;
use crate::evaluate::ConditionalGroup;
use crate::rules::FieldRule;

/// One mutually exclusive billing object and the account rule inside it.
#[derive(Debug, Clone, Copy)]
pub struct PayerRule {
    pub key: &'static str,
    pub account: FieldRule,
}

#[derive(Debug, Clone, Copy)]
pub struct PaymentRules {
    /// Path of the first charge, relative to the root.
    pub first_charge: &'static str,
    pub charge_type: FieldRule,
    /// The first entry is required when no payer object is present.
    pub payers: &'static [PayerRule],
}

/// An address-bearing party (`Shipment.Shipper`, `Shipment.ShipTo`).
#[derive(Debug, Clone, Copy)]
pub struct AddressRole {
    pub node: &'static str,
    pub key_prefix: &'static str,
    pub label: &'static str,
}

/// Rules applied to an address whose country is in `countries`.
#[derive(Debug, Clone, Copy)]
pub struct CountryGroup {
    pub countries: &'static [&'static str],
    pub rules: &'static [FieldRule],
}

#[derive(Debug, Clone, Copy)]
pub struct Domain {
    /// Short identifier (`shipment`, `rate`).
    pub name: &'static str,
    /// Human label used in elicitation messages.
    pub label: &'static str,
    pub layout: CanonicalLayout,
    /// Rule tables required regardless of content, in order.
    pub unconditional: &'static [&'static [FieldRule]],
    /// Groups keyed off the request mode, evaluated right after `unconditional`.
    pub mode_groups: &'static [ConditionalGroup],
    pub payment: PaymentRules,
    /// Path of the package collection, relative to the root.
    pub package_collection: &'static str,
    /// Rules relative to each package.
    pub package_rules: &'static [FieldRule],
    pub address_roles: &'static [AddressRole],
    pub country_groups: &'static [CountryGroup],
    pub conditional: &'static [ConditionalGroup],
    /// Whether the `Shipment` node describes a return.
    pub is_return: fn(&Value) -> bool,
    pub defaults: DefaultsTable,
}

impl Domain {
    /// Prefix a root-relative path with the domain's wrapper key.
    pub fn qualify(&self, relative: &str) -> String {
        format!("{}.{}", self.layout.root, relative)
    }
}

/// Look up a domain by its short name.
pub fn by_name(name: &str) -> Option<&'static Domain> {
    match name {
        "shipment" => Some(&shipment::DOMAIN),
        "rate" => Some(&rating::DOMAIN),
        _ => None,
    }
}
