//! Rule tables shared by the shipment and rating domains. Paths are relative
//! to the domain root wrapper, so one table serves `ShipmentRequest` and
//! `RateRequest` bodies alike.

use crate::domain::{AddressRole, CountryGroup, PayerRule, PaymentRules};
use crate::evaluate::{ConditionalGroup, GroupAction, ShipmentFacts};
use crate::rules::{Constraint, ConstraintValue, FieldRule, FieldType};

use ConstraintValue::{Int, Text};

pub const TWO_LETTER: &[Constraint] = &[("maxLength", Int(2)), ("pattern", Text("^[A-Z]{2}$"))];
pub const THREE_LETTER: &[Constraint] = &[("maxLength", Int(3)), ("pattern", Text("^[A-Z]{3}$"))];
pub const NAME_LENGTH: &[Constraint] = &[("maxLength", Int(35))];
pub const PHONE_LENGTH: &[Constraint] = &[("maxLength", Int(15))];

pub const SERVICE_CODES: &[&str] = &[
    "01", "02", "03", "07", "08", "11", "12", "13", "14", "17", "54", "59", "65", "72", "74",
];
pub const SERVICE_TITLES: &[&str] = &[
    "Next Day Air",
    "2nd Day Air",
    "Ground",
    "Express",
    "Expedited",
    "UPS Standard",
    "3 Day Select",
    "Next Day Air Saver",
    "Next Day Air Early",
    "Worldwide Economy DDU",
    "Express Plus",
    "2nd Day Air A.M.",
    "UPS Saver",
    "Worldwide Economy DDP",
    "UPS Express 12:00",
];

pub const SERVICE_CODE: FieldRule = FieldRule::new("Shipment.Service.Code", "service_code", "UPS service type")
    .one_of(SERVICE_CODES, SERVICE_TITLES);

/// Shipper and recipient identity/address rules, without the service code.
pub const PARTY_RULES: &[FieldRule] = &[
    FieldRule::new("Shipment.Shipper.Name", "shipper_name", "Shipper name"),
    FieldRule::new("Shipment.Shipper.ShipperNumber", "shipper_number", "UPS account number"),
    FieldRule::new(
        "Shipment.Shipper.Address.AddressLine[0]",
        "shipper_address_line_1",
        "Shipper street address",
    ),
    FieldRule::new("Shipment.Shipper.Address.City", "shipper_city", "Shipper city"),
    FieldRule::new(
        "Shipment.Shipper.Address.CountryCode",
        "shipper_country_code",
        "Shipper country code",
    )
    .constrained(TWO_LETTER),
    FieldRule::new("Shipment.ShipTo.Name", "ship_to_name", "Recipient name"),
    FieldRule::new(
        "Shipment.ShipTo.Address.AddressLine[0]",
        "ship_to_address_line_1",
        "Recipient street address",
    ),
    FieldRule::new("Shipment.ShipTo.Address.City", "ship_to_city", "Recipient city"),
    FieldRule::new(
        "Shipment.ShipTo.Address.CountryCode",
        "ship_to_country_code",
        "Recipient country code",
    )
    .constrained(TWO_LETTER),
];

// ──────────────────────────────────────────────
// Payment
// ──────────────────────────────────────────────

pub const FIRST_CHARGE: &str = "Shipment.PaymentInformation.ShipmentCharge[0]";

pub const CHARGE_TYPE: FieldRule = FieldRule::new(
    "Shipment.PaymentInformation.ShipmentCharge[0].Type",
    "payment_charge_type",
    "Shipment charge type",
)
.one_of(&["01", "02"], &["Transportation", "Duties and Taxes"])
.with_default("01");

pub const PAYER_KEYS: &[&str] = &["BillShipper", "BillReceiver", "BillThirdParty"];

pub const PAYERS: &[PayerRule] = &[
    PayerRule {
        key: "BillShipper",
        account: FieldRule::new(
            "Shipment.PaymentInformation.ShipmentCharge[0].BillShipper.AccountNumber",
            "payment_account_number",
            "Billing account number",
        ),
    },
    PayerRule {
        key: "BillReceiver",
        account: FieldRule::new(
            "Shipment.PaymentInformation.ShipmentCharge[0].BillReceiver.AccountNumber",
            "payment_account_number",
            "Billing account number",
        ),
    },
    PayerRule {
        key: "BillThirdParty",
        account: FieldRule::new(
            "Shipment.PaymentInformation.ShipmentCharge[0].BillThirdParty.AccountNumber",
            "payment_account_number",
            "Billing account number",
        ),
    },
];

pub const PAYMENT: PaymentRules = PaymentRules {
    first_charge: FIRST_CHARGE,
    charge_type: CHARGE_TYPE,
    payers: PAYERS,
};

// ──────────────────────────────────────────────
// Packages
// ──────────────────────────────────────────────

pub const PACKAGE_RULES: &[FieldRule] = &[
    FieldRule::new("Packaging.Code", "packaging_code", "Packaging type code")
        .one_of(
            &["02", "01", "03", "04", "21", "24", "25"],
            &[
                "Customer Supplied Package",
                "UPS Letter",
                "Tube",
                "PAK",
                "UPS Express Box",
                "UPS 25KG Box",
                "UPS 10KG Box",
            ],
        )
        .with_default("02"),
    FieldRule::new(
        "PackageWeight.UnitOfMeasurement.Code",
        "weight_unit",
        "Weight unit",
    )
    .one_of(&["LBS", "KGS"], &[])
    .with_default("LBS"),
    FieldRule::new("PackageWeight.Weight", "weight", "Package weight")
        .typed(FieldType::Float)
        .constrained(&[("gt", Int(0))]),
];

// ──────────────────────────────────────────────
// Addresses
// ──────────────────────────────────────────────

pub const ADDRESS_ROLES: &[AddressRole] = &[
    AddressRole {
        node: "Shipment.Shipper",
        key_prefix: "shipper",
        label: "Shipper",
    },
    AddressRole {
        node: "Shipment.ShipTo",
        key_prefix: "ship_to",
        label: "Recipient",
    },
];

// Other countries' postal and province requirements are left to the provider.
pub const COUNTRY_GROUPS: &[CountryGroup] = &[CountryGroup {
    countries: &["US", "CA", "PR"],
    rules: &[
        FieldRule::new("StateProvinceCode", "state", "State/province code").constrained(TWO_LETTER),
        FieldRule::new("PostalCode", "postal_code", "Postal code"),
    ],
}];

// ──────────────────────────────────────────────
// International
// ──────────────────────────────────────────────

pub const SHIPPER_CONTACT_RULES: &[FieldRule] = &[
    FieldRule::new(
        "Shipment.Shipper.AttentionName",
        "shipper_attention_name",
        "Shipper attention name",
    )
    .constrained(NAME_LENGTH),
    FieldRule::new(
        "Shipment.Shipper.Phone.Number",
        "shipper_phone",
        "Shipper phone number",
    )
    .constrained(PHONE_LENGTH),
];

pub const SHIP_TO_CONTACT_RULES: &[FieldRule] = &[
    FieldRule::new(
        "Shipment.ShipTo.AttentionName",
        "ship_to_attention_name",
        "Recipient attention name",
    )
    .constrained(NAME_LENGTH),
    FieldRule::new(
        "Shipment.ShipTo.Phone.Number",
        "ship_to_phone",
        "Recipient phone number",
    )
    .constrained(PHONE_LENGTH),
];

pub const DESCRIPTION_RULES: &[FieldRule] = &[FieldRule::new(
    "Shipment.Description",
    "shipment_description",
    "Description of goods (required for international)",
)
.constrained(&[("maxLength", Int(50))])];

pub const INVOICE_LINE_TOTAL_RULES: &[FieldRule] = &[
    FieldRule::new(
        "Shipment.InvoiceLineTotal.CurrencyCode",
        "invoice_currency_code",
        "Invoice currency code (e.g. USD)",
    )
    .constrained(THREE_LETTER),
    FieldRule::new(
        "Shipment.InvoiceLineTotal.MonetaryValue",
        "invoice_monetary_value",
        "Invoice total monetary value",
    )
    .constrained(&[("maxLength", Int(11)), ("pattern", Text(r"^\d+(\.\d{1,2})?$"))]),
];

/// Forward US shipments to Canada or Puerto Rico declare an invoice total.
pub fn needs_invoice_line_total(facts: &ShipmentFacts) -> bool {
    facts.origin == "US" && matches!(facts.destination.as_str(), "CA" | "PR") && !facts.is_return
}

/// Groups both domains evaluate after the address checks.
pub const INTERNATIONAL_GROUPS: [ConditionalGroup; 4] = [
    ConditionalGroup {
        name: "international_shipper_contact",
        applies: ShipmentFacts::is_international,
        action: GroupAction::Require(SHIPPER_CONTACT_RULES),
    },
    ConditionalGroup {
        name: "recipient_contact",
        applies: |facts| facts.is_international() || facts.service_code == "14",
        action: GroupAction::Require(SHIP_TO_CONTACT_RULES),
    },
    ConditionalGroup {
        name: "international_description",
        applies: ShipmentFacts::needs_customs_documents,
        action: GroupAction::Require(DESCRIPTION_RULES),
    },
    ConditionalGroup {
        name: "invoice_line_total",
        applies: needs_invoice_line_total,
        action: GroupAction::Require(INVOICE_LINE_TOTAL_RULES),
    },
];
