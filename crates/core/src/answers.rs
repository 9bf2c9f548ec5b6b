//! Flat answer normalization and validation.
//!
//! Answers are keyed by flat key. Naming conventions on the key decide the
//! checks: `*_country_code`, `*_state`, `*_currency_code`, `*_weight_unit`,
//! `*_weight` and `*_postal_code`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::rules::MissingField;

/// Flat key to answer text.
pub type Answers = BTreeMap<String, String>;

static TWO_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());
static THREE_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());
static POSTAL_US: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static POSTAL_CA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]\d[A-Z] ?\d[A-Z]\d$").unwrap());

const UPPERCASE_SUFFIXES: &[&str] = &["_country_code", "_state", "_weight_unit", "_currency_code"];

fn is_country_key(key: &str) -> bool {
    key.ends_with("_country_code")
}

fn is_state_key(key: &str) -> bool {
    key.ends_with("_state")
}

fn is_currency_key(key: &str) -> bool {
    key.ends_with("_currency_code")
}

fn is_weight_key(key: &str) -> bool {
    key.ends_with("_weight")
}

/// Trim every value, uppercase code-like keys, drop blank answers.
pub fn normalize(answers: &Answers) -> Answers {
    answers
        .iter()
        .filter_map(|(key, value)| {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            let value = if UPPERCASE_SUFFIXES.iter().any(|suffix| key.ends_with(suffix)) {
                value.to_uppercase()
            } else {
                value.to_string()
            };
            Some((key.clone(), value))
        })
        .collect()
}

/// Check normalized answers against field metadata and key conventions.
/// Returns one message per problem, in form order; empty means valid.
pub fn validate(answers: &Answers, fields: &[MissingField]) -> Vec<String> {
    let by_key: HashMap<&str, &MissingField> = fields
        .iter()
        .map(|field| (field.flat_key.as_str(), field))
        .collect();
    let mut errors = Vec::new();

    for (key, value) in form_order(answers, fields) {
        let field = by_key.get(key).copied();
        let label = field.map_or(key, |f| f.prompt.as_str());

        if let Some(field) = field {
            if !field.enum_values.is_empty() && !field.enum_values.contains(&value) {
                errors.push(format!(
                    "{}: must be one of [{}]",
                    label,
                    field.enum_values.join(", ")
                ));
            }
        }

        if is_weight_key(key) {
            match value.parse::<f64>() {
                Ok(weight) if weight.is_finite() && weight > 0.0 => {}
                Ok(_) => errors.push(format!("{}: must be a positive, finite number", label)),
                Err(_) => errors.push(format!("{}: must be a number", label)),
            }
        }

        if is_country_key(key) && !TWO_ALPHA.is_match(value) {
            errors.push(format!("{}: must be a 2-letter country code", label));
        }
        if is_state_key(key) && !TWO_ALPHA.is_match(value) {
            errors.push(format!("{}: must be a 2-letter state/province code", label));
        }
        if is_currency_key(key) && !THREE_ALPHA.is_match(value) {
            errors.push(format!(
                "{}: must be a 3-letter currency code (e.g. USD, EUR, GBP)",
                label
            ));
        }

        if let Some(prefix) = key.strip_suffix("_postal_code") {
            let country = answers
                .get(&format!("{}_country_code", prefix))
                .map(|c| c.to_uppercase())
                .unwrap_or_default();
            match country.as_str() {
                "US" if !POSTAL_US.is_match(value) => errors.push(format!(
                    "{}: must be a valid US postal code (e.g. 10001 or 10001-1234)",
                    label
                )),
                "CA" if !POSTAL_CA.is_match(value) => errors.push(format!(
                    "{}: must be a valid Canadian postal code (e.g. K1A 0B1)",
                    label
                )),
                _ => {}
            }
        }
    }
    errors
}

/// Answered fields in the order they were asked, then any extra keys.
fn form_order<'a>(answers: &'a Answers, fields: &'a [MissingField]) -> Vec<(&'a str, &'a str)> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::with_capacity(answers.len());
    for field in fields {
        let key = field.flat_key.as_str();
        if let Some(value) = answers.get(key) {
            if seen.insert(key) {
                ordered.push((key, value.as_str()));
            }
        }
    }
    for (key, value) in answers {
        if !seen.contains(key.as_str()) {
            ordered.push((key.as_str(), value.as_str()));
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::common::{CHARGE_TYPE, PACKAGE_RULES};

    fn answers(pairs: &[(&str, &str)]) -> Answers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn normalize_trims_uppercases_and_drops_blanks() {
        let out = normalize(&answers(&[
            ("shipper_country_code", " us "),
            ("ship_to_state", "ny"),
            ("package_1_weight_unit", "lbs"),
            ("invoice_currency_code", "usd"),
            ("shipper_name", "  Acme  "),
            ("shipper_city", "   "),
        ]));
        assert_eq!(
            out,
            answers(&[
                ("shipper_country_code", "US"),
                ("ship_to_state", "NY"),
                ("package_1_weight_unit", "LBS"),
                ("invoice_currency_code", "USD"),
                ("shipper_name", "Acme"),
            ])
        );
    }

    #[test]
    fn weight_rejects_non_positive_and_non_finite() {
        for bad in ["inf", "-inf", "nan", "0", "-1"] {
            let errors = validate(&answers(&[("package_1_weight", bad)]), &[]);
            assert_eq!(
                errors,
                ["package_1_weight: must be a positive, finite number"],
                "{}",
                bad
            );
        }
        assert_eq!(
            validate(&answers(&[("package_1_weight", "heavy")]), &[]),
            ["package_1_weight: must be a number"]
        );
        assert!(validate(&answers(&[("package_1_weight", "5.5")]), &[]).is_empty());
    }

    #[test]
    fn enum_errors_use_prompt_label() {
        let field = CHARGE_TYPE.missing();
        let errors = validate(&answers(&[("payment_charge_type", "03")]), &[field]);
        assert_eq!(errors, ["Shipment charge type: must be one of [01, 02]"]);
    }

    #[test]
    fn weight_unit_is_checked_against_enum() {
        let unit = PACKAGE_RULES[1].missing_at("P", "package_1_weight_unit", "Weight unit");
        let errors = validate(&answers(&[("package_1_weight_unit", "OZ")]), &[unit]);
        assert_eq!(errors, ["Weight unit: must be one of [LBS, KGS]"]);
    }

    #[test]
    fn errors_follow_form_order() {
        let fields = [
            MissingField::new("Shipper.Address.StateProvinceCode", "shipper_state", "Shipper state"),
            MissingField::new("Package[0].PackageWeight.Weight", "package_1_weight", "Package weight"),
        ];
        let errors = validate(
            &answers(&[
                ("package_1_weight", "heavy"),
                ("shipper_state", "Georgia"),
                ("invoice_currency_code", "US"),
            ]),
            &fields,
        );
        assert_eq!(
            errors,
            [
                "Shipper state: must be a 2-letter state/province code",
                "Package weight: must be a number",
                "invoice_currency_code: must be a 3-letter currency code (e.g. USD, EUR, GBP)",
            ]
        );
    }

    #[test]
    fn code_shapes() {
        let errors = validate(
            &answers(&[
                ("shipper_country_code", "USA"),
                ("ship_to_state", "N1"),
                ("invoice_currency_code", "US"),
            ]),
            &[],
        );
        assert_eq!(
            errors,
            [
                "invoice_currency_code: must be a 3-letter currency code (e.g. USD, EUR, GBP)",
                "ship_to_state: must be a 2-letter state/province code",
                "shipper_country_code: must be a 2-letter country code",
            ]
        );
    }

    #[test]
    fn postal_codes_follow_sibling_country() {
        let ok = answers(&[
            ("shipper_country_code", "US"),
            ("shipper_postal_code", "10001-1234"),
            ("ship_to_country_code", "CA"),
            ("ship_to_postal_code", "K1A 0B1"),
        ]);
        assert!(validate(&ok, &[]).is_empty());

        let bad = answers(&[
            ("shipper_country_code", "US"),
            ("shipper_postal_code", "1000"),
            ("ship_to_country_code", "CA"),
            ("ship_to_postal_code", "12345"),
        ]);
        assert_eq!(
            validate(&bad, &[]),
            [
                "ship_to_postal_code: must be a valid Canadian postal code (e.g. K1A 0B1)",
                "shipper_postal_code: must be a valid US postal code (e.g. 10001 or 10001-1234)",
            ]
        );
    }

    #[test]
    fn postal_codes_for_other_or_unknown_countries_pass() {
        let answers = answers(&[
            ("shipper_country_code", "GB"),
            ("shipper_postal_code", "SW1A 1AA"),
            ("ship_to_postal_code", "anything"),
        ]);
        assert!(validate(&answers, &[]).is_empty());
    }
}
