//! Rating (`RateRequest`) rules.
//!
//! Rating shares the shipment party, payment, package and address tables.
//! It has no request option rule or international forms, and the service
//! code is only required when rating a specific service.

use serde_json::Value;

use crate::canonicalize::{canonicalize, CanonicalLayout, CanonicalizeError};
use crate::defaults::{DefaultsTable, ACCOUNT_NUMBER_KEY};
use crate::domain::common::{
    ADDRESS_ROLES, COUNTRY_GROUPS, INTERNATIONAL_GROUPS, PACKAGE_RULES, PARTY_RULES, PAYMENT,
    SERVICE_CODE,
};
use crate::domain::Domain;
use crate::evaluate::{ConditionalGroup, GroupAction};

pub const ROOT: &str = "RateRequest";

const MODE_GROUPS: &[ConditionalGroup] = &[ConditionalGroup {
    name: "service_code_unless_shopping",
    applies: |facts| !facts.shop,
    action: GroupAction::Require(&[SERVICE_CODE]),
}];

// Any non-null ReturnService counts, matching how the provider treats it.
fn is_return(shipment: &Value) -> bool {
    shipment
        .get("ReturnService")
        .is_some_and(|service| !service.is_null())
}

pub static DOMAIN: Domain = Domain {
    name: "rate",
    label: "rate request",
    layout: CanonicalLayout {
        root: ROOT,
        anchors: &["Shipment", "Shipment.PaymentInformation"],
        list_fields: &["Shipment.Package", "Shipment.PaymentInformation.ShipmentCharge"],
    },
    unconditional: &[PARTY_RULES],
    mode_groups: MODE_GROUPS,
    payment: PAYMENT,
    package_collection: "Shipment.Package",
    package_rules: PACKAGE_RULES,
    address_roles: ADDRESS_ROLES,
    country_groups: COUNTRY_GROUPS,
    conditional: &INTERNATIONAL_GROUPS,
    is_return,
    defaults: DefaultsTable {
        built_in: &[("Shipment.PaymentInformation.ShipmentCharge[0].Type", "01")],
        from_config: &[("Shipment.Shipper.ShipperNumber", ACCOUNT_NUMBER_KEY)],
        billing: Some((
            "Shipment.PaymentInformation.ShipmentCharge[0].BillShipper.AccountNumber",
            ACCOUNT_NUMBER_KEY,
        )),
    },
};

/// Rename each package's `Packaging` to `PackagingType`, the key the rating
/// API expects. Applied after validation, on a canonical copy.
pub fn remap_packaging_for_rating(body: &Value) -> Result<Value, CanonicalizeError> {
    let mut result = canonicalize(&DOMAIN.layout, body)?;
    let packages = result
        .get_mut(ROOT)
        .and_then(|root| root.get_mut("Shipment"))
        .and_then(|shipment| shipment.get_mut("Package"))
        .and_then(Value::as_array_mut);
    if let Some(packages) = packages {
        for package in packages.iter_mut().filter_map(Value::as_object_mut) {
            if let Some(packaging) = package.remove("Packaging") {
                package.insert("PackagingType".to_string(), packaging);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{find_missing, EvaluationMode};
    use serde_json::json;

    fn complete_rate_body() -> Value {
        json!({"RateRequest": {"Shipment": {
            "Shipper": {
                "Name": "Shipper", "ShipperNumber": "129D9Y",
                "Address": {"AddressLine": ["1 Main"], "City": "Atlanta",
                            "StateProvinceCode": "GA", "PostalCode": "30301", "CountryCode": "US"},
            },
            "ShipTo": {
                "Name": "Recipient",
                "Address": {"AddressLine": ["2 Elm"], "City": "Austin",
                            "StateProvinceCode": "TX", "PostalCode": "73301", "CountryCode": "US"},
            },
            "PaymentInformation": {"ShipmentCharge": {"Type": "01",
                                   "BillShipper": {"AccountNumber": "129D9Y"}}},
            "Service": {"Code": "03"},
            "Package": {"Packaging": {"Code": "02"},
                        "PackageWeight": {"UnitOfMeasurement": {"Code": "LBS"}, "Weight": "2"}},
        }}})
    }

    fn keys(body: &Value, option: &str) -> Vec<String> {
        find_missing(&DOMAIN, body, &EvaluationMode::with_request_option(option))
            .unwrap()
            .into_iter()
            .map(|f| f.flat_key)
            .collect()
    }

    #[test]
    fn complete_body_in_single_object_form_has_nothing_missing() {
        assert!(keys(&complete_rate_body(), "Rate").is_empty());
    }

    #[test]
    fn service_code_required_only_outside_shop_modes() {
        let mut body = complete_rate_body();
        body["RateRequest"]["Shipment"]
            .as_object_mut()
            .unwrap()
            .remove("Service");
        assert_eq!(keys(&body, "Rate"), ["service_code"]);
        assert_eq!(keys(&body, "Ratetimeintransit"), ["service_code"]);
        assert!(keys(&body, "Shop").is_empty());
        assert!(keys(&body, "shoptimeintransit").is_empty());
    }

    #[test]
    fn no_request_option_rule() {
        let missing = keys(&json!({}), "Rate");
        assert!(!missing.contains(&"request_option".to_string()));
        assert_eq!(missing.first().map(String::as_str), Some("shipper_name"));
    }

    #[test]
    fn any_return_service_value_suppresses_invoice_total() {
        let mut body = complete_rate_body();
        body["RateRequest"]["Shipment"]["ShipTo"]["Address"]["CountryCode"] = json!("CA");
        body["RateRequest"]["Shipment"]["Shipper"]["AttentionName"] = json!("A");
        body["RateRequest"]["Shipment"]["Shipper"]["Phone"] = json!({"Number": "1"});
        body["RateRequest"]["Shipment"]["ShipTo"]["AttentionName"] = json!("B");
        body["RateRequest"]["Shipment"]["ShipTo"]["Phone"] = json!({"Number": "2"});
        body["RateRequest"]["Shipment"]["Description"] = json!("Books");
        assert_eq!(
            keys(&body, "Rate"),
            ["invoice_currency_code", "invoice_monetary_value"]
        );

        body["RateRequest"]["Shipment"]["ReturnService"] = json!({});
        assert!(keys(&body, "Rate").is_empty());
    }

    #[test]
    fn international_rating_has_no_forms_requirement() {
        let mut body = complete_rate_body();
        body["RateRequest"]["Shipment"]["ShipTo"]["Address"] =
            json!({"AddressLine": ["1 Rue"], "City": "Paris", "CountryCode": "FR"});
        let missing = keys(&body, "Rate");
        assert!(missing.contains(&"shipment_description".to_string()));
        assert!(!missing.iter().any(|k| k.starts_with("intl_forms")));
    }

    #[test]
    fn remap_renames_packaging_in_every_package() {
        let body = json!({"RateRequest": {"Shipment": {"Package": [
            {"Packaging": {"Code": "02"}, "PackageWeight": {"Weight": "1"}},
            {"PackageWeight": {"Weight": "2"}},
        ]}}});
        let out = remap_packaging_for_rating(&body).unwrap();
        let packages = &out["RateRequest"]["Shipment"]["Package"];
        assert_eq!(packages[0]["PackagingType"], json!({"Code": "02"}));
        assert!(packages[0].get("Packaging").is_none());
        assert!(packages[1].get("PackagingType").is_none());
        assert!(body["RateRequest"]["Shipment"]["Package"][0].get("Packaging").is_some());
    }

    #[test]
    fn remap_wraps_single_package() {
        let out = remap_packaging_for_rating(&complete_rate_body()).unwrap();
        assert_eq!(
            out["RateRequest"]["Shipment"]["Package"][0]["PackagingType"],
            json!({"Code": "02"})
        );
    }
}
