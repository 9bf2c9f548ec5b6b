//! Shipment creation (`ShipmentRequest`) rules, including international
//! forms and duties billing.

use serde_json::Value;

use crate::array::{expand_array_fields, ArrayFieldRule};
use crate::canonicalize::CanonicalLayout;
use crate::defaults::{DefaultsTable, ACCOUNT_NUMBER_KEY};
use crate::domain::common::{
    self, ADDRESS_ROLES, COUNTRY_GROUPS, INTERNATIONAL_GROUPS, NAME_LENGTH, PACKAGE_RULES, PAYER_KEYS,
    PAYMENT, PHONE_LENGTH, SERVICE_CODE, THREE_LETTER, TWO_LETTER,
};
use crate::domain::Domain;
use crate::evaluate::{require, ConditionalGroup, GroupAction, ShipmentFacts};
use crate::path;
use crate::rules::{ConstraintValue, FieldRule, FieldType, MissingField};

use ConstraintValue::{Int, Text};

pub const ROOT: &str = "ShipmentRequest";

pub const REQUEST_OPTION: FieldRule =
    FieldRule::new("Request.RequestOption", "request_option", "Request option");

// ──────────────────────────────────────────────
// International forms
// ──────────────────────────────────────────────

const FORMS: &str = "Shipment.ShipmentServiceOptions.InternationalForms";

pub const FORM_TYPE_CODES: &[&str] = &["01", "03", "04", "05", "06", "07", "08", "09", "10", "11"];
pub const FORM_TYPE_TITLES: &[&str] = &[
    "Invoice",
    "CO",
    "USMCA",
    "Partial Invoice",
    "Packinglist",
    "Customer Generated Forms",
    "Air Freight Packing List",
    "CN22",
    "UPS Premium Care Form",
    "EEI",
];
pub const FORMS_REQUIRING_PRODUCTS: &[&str] = &["01", "03", "04", "05", "06", "08", "11"];
pub const FORMS_REQUIRING_CURRENCY: &[&str] = &["01", "05"];
pub const FORMS_REQUIRING_SOLD_TO: &[&str] = &["01", "04"];
const INVOICE: &str = "01";

pub const FORM_TYPE: FieldRule = FieldRule::new(
    "Shipment.ShipmentServiceOptions.InternationalForms.FormType",
    "intl_forms_form_type",
    "International form type",
)
.one_of(FORM_TYPE_CODES, FORM_TYPE_TITLES);

pub const FORMS_CURRENCY: FieldRule = FieldRule::new(
    "Shipment.ShipmentServiceOptions.InternationalForms.CurrencyCode",
    "intl_forms_currency_code",
    "Currency code for international forms (e.g. USD, EUR, GBP)",
)
.constrained(THREE_LETTER);

pub const INVOICE_RULES: &[FieldRule] = &[
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.ReasonForExport",
        "intl_forms_reason_for_export",
        "Reason for export",
    )
    .one_of(
        &["SALE", "GIFT", "SAMPLE", "RETURN", "REPAIR", "INTERCOMPANYDATA"],
        &["Sale", "Gift", "Sample", "Return", "Repair", "Intercompany Data"],
    ),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.InvoiceNumber",
        "intl_forms_invoice_number",
        "Commercial invoice number",
    )
    .constrained(NAME_LENGTH),
];

pub const INVOICE_DATE: FieldRule = FieldRule::new(
    "Shipment.ShipmentServiceOptions.InternationalForms.InvoiceDate",
    "intl_forms_invoice_date",
    "Invoice date (YYYYMMDD format)",
)
.constrained(&[("maxLength", Int(8)), ("pattern", Text(r"^\d{8}$"))]);

pub const SOLD_TO_RULES: &[FieldRule] = &[
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.Name",
        "sold_to_name",
        "Sold-to party name",
    )
    .constrained(NAME_LENGTH),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.AttentionName",
        "sold_to_attention_name",
        "Sold-to attention name",
    )
    .constrained(NAME_LENGTH),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.Phone.Number",
        "sold_to_phone",
        "Sold-to phone number",
    )
    .constrained(PHONE_LENGTH),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.Address.AddressLine",
        "sold_to_address_line",
        "Sold-to street address",
    ),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.Address.City",
        "sold_to_city",
        "Sold-to city",
    ),
    FieldRule::new(
        "Shipment.ShipmentServiceOptions.InternationalForms.Contacts.SoldTo.Address.CountryCode",
        "sold_to_country_code",
        "Sold-to country code",
    )
    .constrained(TWO_LETTER),
];

pub const PRODUCT_ITEM_RULES: &[FieldRule] = &[
    FieldRule::new("Description", "description", "Product description")
        .constrained(&[("maxLength", Int(35))]),
    FieldRule::new("Unit.Number", "quantity", "Quantity")
        .typed(FieldType::Integer)
        .constrained(&[("gt", Int(0))]),
    FieldRule::new("Unit.Value", "value", "Unit value ($)")
        .typed(FieldType::Float)
        .constrained(&[("gt", Int(0))]),
    FieldRule::new("Unit.UnitOfMeasurement.Code", "unit_code", "Unit of measure")
        .one_of(
            &["PCS", "BOX", "DZ", "EA", "KG", "LB", "PR"],
            &["Pieces", "Box", "Dozen", "Each", "Kilogram", "Pound", "Pair"],
        )
        .with_default("PCS"),
    FieldRule::new("OriginCountryCode", "origin_country", "Country of origin")
        .constrained(TWO_LETTER),
];

pub const PRODUCTS: ArrayFieldRule = ArrayFieldRule::new(
    "ShipmentRequest.Shipment.ShipmentServiceOptions.InternationalForms.Product",
    "product",
    PRODUCT_ITEM_RULES,
);

const FORMS_GUIDANCE: &str = "International shipments require InternationalForms. \
Add ShipmentServiceOptions.InternationalForms to request_body with at least: \
FormType (e.g. '01' for Invoice), CurrencyCode, ReasonForExport, and a Product array. \
Example structure: {\"ShipmentServiceOptions\": {\"InternationalForms\": {\
\"FormType\": \"01\", \"CurrencyCode\": \"USD\", \"ReasonForExport\": \"SALE\", \
\"InvoiceNumber\": \"INV-001\", \"InvoiceDate\": \"20260216\", \
\"Product\": [{\"Description\": \"Electronics\", \"Unit\": {\"Number\": \"1\", \"Value\": \"100\", \
\"UnitOfMeasurement\": {\"Code\": \"PCS\"}}, \"CommodityCode\": \"8471.30\", \
\"OriginCountryCode\": \"US\"}]}}}";

const DUTIES_PAYER_GUIDANCE: &str = "Duties and Taxes charge (ShipmentCharge[1] Type '02') \
requires a payer. Add BillShipper, BillReceiver, or BillThirdParty with AccountNumber.";

/// Declared form type codes: a single string or a list of strings.
pub fn form_types(forms: &Value) -> Vec<String> {
    match forms.get("FormType") {
        Some(Value::String(code)) if !code.trim().is_empty() => vec![code.trim().to_string()],
        Some(Value::Array(codes)) => codes
            .iter()
            .filter_map(|code| match code {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn international_forms(domain: &Domain, body: &Value, facts: &ShipmentFacts) -> Vec<MissingField> {
    let forms_path = domain.qualify(FORMS);
    let Some(forms @ Value::Object(_)) = path::read(body, &forms_path) else {
        if facts.needs_customs_documents() {
            return vec![MissingField::structural(
                forms_path,
                "intl_forms_required",
                FORMS_GUIDANCE,
            )];
        }
        return Vec::new();
    };

    let types = form_types(forms);
    let declares = |codes: &[&str]| types.iter().any(|t| codes.contains(&t.as_str()));
    let mut missing = Vec::new();

    if types.is_empty() {
        missing.extend(require(domain, body, &[FORM_TYPE]));
    }
    if declares(FORMS_REQUIRING_PRODUCTS) {
        missing.extend(expand_array_fields(&PRODUCTS, body, None));
    }
    if declares(FORMS_REQUIRING_CURRENCY) {
        missing.extend(require(domain, body, &[FORMS_CURRENCY]));
    }
    if declares(&[INVOICE]) {
        missing.extend(require(domain, body, INVOICE_RULES));
        if !facts.is_return {
            missing.extend(require(domain, body, &[INVOICE_DATE]));
        }
    }
    if declares(FORMS_REQUIRING_SOLD_TO) {
        missing.extend(require(domain, body, SOLD_TO_RULES));
    }
    missing
}

/// A duties-and-taxes second charge must name who pays it.
fn duties_payer(domain: &Domain, body: &Value, _facts: &ShipmentFacts) -> Vec<MissingField> {
    let charges_path = domain.qualify("Shipment.PaymentInformation.ShipmentCharge");
    let Some(Value::Array(charges)) = path::read(body, &charges_path) else {
        return Vec::new();
    };
    let Some(second) = charges.get(1) else {
        return Vec::new();
    };
    if path::read_str(second, "Type") != "02" {
        return Vec::new();
    }
    let has_payer = second
        .as_object()
        .is_some_and(|charge| PAYER_KEYS.iter().any(|key| charge.contains_key(*key)));
    if has_payer {
        return Vec::new();
    }
    vec![MissingField::structural(
        format!("{}[1]", charges_path),
        "duties_payer_required",
        DUTIES_PAYER_GUIDANCE,
    )]
}

/// A map-valued `ReturnService` with a non-empty `Code`.
fn is_return(shipment: &Value) -> bool {
    shipment
        .get("ReturnService")
        .and_then(Value::as_object)
        .and_then(|service| service.get("Code"))
        .is_some_and(path::is_present)
}

const CONDITIONAL: &[ConditionalGroup] = &[
    INTERNATIONAL_GROUPS[0],
    INTERNATIONAL_GROUPS[1],
    INTERNATIONAL_GROUPS[2],
    INTERNATIONAL_GROUPS[3],
    ConditionalGroup {
        name: "international_forms",
        applies: ShipmentFacts::is_international,
        action: GroupAction::Emit(international_forms),
    },
    ConditionalGroup {
        name: "duties_payer",
        applies: ShipmentFacts::is_international,
        action: GroupAction::Emit(duties_payer),
    },
];

pub static DOMAIN: Domain = Domain {
    name: "shipment",
    label: "shipment creation",
    layout: CanonicalLayout {
        root: ROOT,
        anchors: &["Shipment", "Shipment.PaymentInformation"],
        list_fields: &["Shipment.Package", "Shipment.PaymentInformation.ShipmentCharge"],
    },
    unconditional: &[&[REQUEST_OPTION], common::PARTY_RULES, &[SERVICE_CODE]],
    mode_groups: &[],
    payment: PAYMENT,
    package_collection: "Shipment.Package",
    package_rules: PACKAGE_RULES,
    address_roles: ADDRESS_ROLES,
    country_groups: COUNTRY_GROUPS,
    conditional: CONDITIONAL,
    is_return,
    defaults: DefaultsTable {
        built_in: &[
            ("Request.RequestOption", "nonvalidate"),
            ("Shipment.PaymentInformation.ShipmentCharge[0].Type", "01"),
        ],
        from_config: &[("Shipment.Shipper.ShipperNumber", ACCOUNT_NUMBER_KEY)],
        billing: Some((
            "Shipment.PaymentInformation.ShipmentCharge[0].BillShipper.AccountNumber",
            ACCOUNT_NUMBER_KEY,
        )),
    },
};
