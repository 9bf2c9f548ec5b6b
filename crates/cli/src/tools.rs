//! The tool catalog and the operations behind each tool.
//!
//! `rate_shipment` and `create_shipment` run the request body through the
//! completion pipeline before calling the provider; every other tool maps its
//! arguments straight onto an operation call. Provider responses are returned
//! as the client envelope, including non-2xx ones.

use std::sync::Arc;

use parcelkit_client::{
    ClientError, HttpClient, OperationCall, OperationRegistry, RegistryError, TokenManager,
    Transport, UreqTransport,
};
use parcelkit_core::domain::{rating, shipment};
use parcelkit_core::{ElicitationError, Elicitor, EvaluationMode};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::Settings;
use crate::pipeline;

const RATE_OPERATION_ID: &str = "Rate";
const SHIPMENT_OPERATION_ID: &str = "Shipment";
const VOID_SHIPMENT_OPERATION_ID: &str = "VoidShipment";
const LABEL_RECOVERY_OPERATION_ID: &str = "LabelRecovery";
const TIME_IN_TRANSIT_OPERATION_ID: &str = "TimeInTransit";
const TRACK_OPERATION_ID: &str = "TrackPackage";
const ADDRESS_VALIDATION_OPERATION_ID: &str = "ValidateAddress";

/// Accepted `requestoption` values and the path segment each maps to.
const RATE_REQUEST_OPTIONS: &[(&str, &str)] = &[
    ("rate", "Rate"),
    ("shop", "Shop"),
    ("ratetimeintransit", "Ratetimeintransit"),
    ("shoptimeintransit", "Shoptimeintransit"),
];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Operation is deprecated and not exposed: {0}")]
    Deprecated(String),
    #[error("request_body is required for operation {0}")]
    BodyRequired(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Elicitation(#[from] ElicitationError),
}

impl ToolError {
    fn code(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "UNKNOWN_TOOL",
            ToolError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ToolError::Deprecated(_) => "OPERATION_DEPRECATED",
            ToolError::BodyRequired(_) => "REQUEST_BODY_REQUIRED",
            ToolError::Registry(_) => "OPERATION_UNAVAILABLE",
            ToolError::Client(_) => "CLIENT_ERROR",
            ToolError::Elicitation(_) => "ELICITATION_ERROR",
        }
    }

    /// `{"code", "message", "reason", "missing"}`, the same shape elicitation
    /// errors use.
    pub fn to_json_value(&self) -> Value {
        match self {
            ToolError::Elicitation(err) => err.to_json_value(),
            other => json!({
                "code": other.code(),
                "message": other.to_string(),
                "reason": other.code().to_ascii_lowercase(),
                "missing": [],
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Arguments
// ──────────────────────────────────────────────

/// Typed accessors over a `tools/call` arguments object.
struct Args<'a>(&'a Map<String, Value>);

impl<'a> Args<'a> {
    fn required_str(&self, name: &str) -> Result<&'a str, ToolError> {
        match self.0.get(name) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(Value::Null) | None => Err(ToolError::InvalidArgument(format!(
                "missing required argument '{}'",
                name
            ))),
            Some(_) => Err(ToolError::InvalidArgument(format!(
                "argument '{}' must be a string",
                name
            ))),
        }
    }

    /// Blank strings count as absent.
    fn optional_str(&self, name: &str) -> Result<Option<&'a str>, ToolError> {
        match self.0.get(name) {
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(ToolError::InvalidArgument(format!(
                "argument '{}' must be a string",
                name
            ))),
        }
    }

    fn str_or(&self, name: &str, default: &'a str) -> Result<&'a str, ToolError> {
        Ok(self.optional_str(name)?.unwrap_or(default))
    }

    fn bool_or(&self, name: &str, default: bool) -> Result<bool, ToolError> {
        match self.0.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Null) | None => Ok(default),
            Some(_) => Err(ToolError::InvalidArgument(format!(
                "argument '{}' must be a boolean",
                name
            ))),
        }
    }

    fn request_body(&self) -> Result<&'a Value, ToolError> {
        match self.0.get("request_body") {
            Some(body @ Value::Object(_)) => Ok(body),
            _ => Err(ToolError::InvalidArgument(
                "request_body must be a JSON object".to_string(),
            )),
        }
    }

    fn trans_id(&self) -> Result<Option<String>, ToolError> {
        Ok(self.optional_str("trans_id")?.map(str::to_string))
    }

    fn transaction_src(&self) -> Result<Option<String>, ToolError> {
        Ok(self.optional_str("transaction_src")?.map(str::to_string))
    }
}

fn rate_path_option(requested: &str) -> Result<&'static str, ToolError> {
    let lowered = requested.to_ascii_lowercase();
    RATE_REQUEST_OPTIONS
        .iter()
        .find(|(option, _)| *option == lowered)
        .map(|(_, path_value)| *path_value)
        .ok_or_else(|| {
            let mut allowed: Vec<&str> = RATE_REQUEST_OPTIONS.iter().map(|(_, v)| *v).collect();
            allowed.sort_unstable();
            ToolError::InvalidArgument(format!(
                "Invalid requestoption '{}'. Allowed values: {}",
                requested,
                allowed.join(", ")
            ))
        })
}

// ──────────────────────────────────────────────
// ToolManager
// ──────────────────────────────────────────────

pub struct ToolManager {
    settings: Settings,
    registry: OperationRegistry,
    /// Track and address validation live outside the provider's published
    /// OpenAPI documents, so they always come from the embedded table.
    embedded: OperationRegistry,
    http: HttpClient,
}

impl ToolManager {
    pub fn new(settings: Settings) -> Result<Self, ToolError> {
        ToolManager::with_transport(settings, Arc::new(UreqTransport::new()))
    }

    pub fn with_transport(
        settings: Settings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ToolError> {
        let embedded = OperationRegistry::embedded()?;
        let registry = match &settings.specs_dir {
            Some(dir) => OperationRegistry::from_dir(dir)?,
            None => embedded.clone(),
        };
        tracing::debug!(
            operations = registry.len(),
            environment = %settings.environment,
            "operation registry loaded"
        );

        let environment = settings.environment;
        let tokens = Arc::new(TokenManager::new(
            environment.token_url(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
            transport.clone(),
        ));
        let http = HttpClient::new(environment.base_url(), tokens, transport);

        Ok(ToolManager {
            settings,
            registry,
            embedded,
            http,
        })
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        elicitor: &dyn Elicitor,
    ) -> Result<Value, ToolError> {
        let args = Args(arguments);
        tracing::info!(tool = name, "tool call");
        match name {
            "track_package" => self.track_package(&args).await,
            "validate_address" => self.validate_address(&args).await,
            "rate_shipment" => self.rate_shipment(&args, elicitor).await,
            "create_shipment" => self.create_shipment(&args, elicitor).await,
            "void_shipment" => self.void_shipment(&args).await,
            "recover_label" => self.recover_label(&args).await,
            "get_time_in_transit" => self.get_time_in_transit(&args).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    async fn track_package(&self, args: &Args<'_>) -> Result<Value, ToolError> {
        let operation = self.embedded.get_operation(TRACK_OPERATION_ID)?;
        let call = OperationCall::new(operation, "track_package")
            .path_param("inquiryNum", args.required_str("inquiryNumber")?)
            .query_param("locale", args.str_or("locale", "en_US")?)
            .query_param("returnSignature", args.bool_or("returnSignature", false)?)
            .query_param("returnMilestones", args.bool_or("returnMilestones", false)?)
            .query_param("returnPOD", args.bool_or("returnPOD", false)?)
            .trans_id(args.trans_id()?)
            .transaction_src(self.transaction_src(args)?);
        self.send(call).await
    }

    async fn validate_address(&self, args: &Args<'_>) -> Result<Value, ToolError> {
        let mut address_lines = vec![args.required_str("addressLine1")?];
        if let Some(line2) = args.optional_str("addressLine2")? {
            address_lines.push(line2);
        }

        let mut key_format = json!({
            "AddressLine": address_lines,
            "PoliticalDivision2": args.required_str("politicalDivision2")?,
            "PoliticalDivision1": args.required_str("politicalDivision1")?,
            "PostcodePrimaryLow": args.required_str("zipPrimary")?,
            "CountryCode": args.required_str("countryCode")?,
        });
        if let Some(urbanization) = args.optional_str("urbanization")? {
            key_format["Urbanization"] = json!(urbanization);
        }
        if let Some(extended) = args.optional_str("zipExtended")? {
            key_format["PostcodeExtendedLow"] = json!(extended);
        }

        let operation = self.embedded.get_operation(ADDRESS_VALIDATION_OPERATION_ID)?;
        let call = OperationCall::new(operation, "validate_address")
            .query_param("regionalrequestindicator", false)
            .query_param("maximumcandidatelistsize", 3)
            .body(json!({"XAVRequest": {"AddressKeyFormat": key_format}}))
            .trans_id(args.trans_id()?)
            .transaction_src(self.transaction_src(args)?);
        self.send(call).await
    }

    async fn rate_shipment(
        &self,
        args: &Args<'_>,
        elicitor: &dyn Elicitor,
    ) -> Result<Value, ToolError> {
        let requested = args.required_str("requestoption")?;
        let path_option = rate_path_option(requested)?;
        let body = args.request_body()?;

        let mode = EvaluationMode::with_request_option(requested);
        let completed =
            pipeline::complete(&rating::DOMAIN, body, &mode, &self.settings, elicitor).await?;
        let outgoing = rating::remap_packaging_for_rating(&completed)
            .map_err(ElicitationError::from)?;

        self.execute(
            RATE_OPERATION_ID,
            "rate_shipment",
            json!({"version": args.str_or("version", "v2409")?, "requestoption": path_option}),
            json!({"additionalinfo": args.optional_str("additionalinfo")?}),
            Some(outgoing),
            args,
        )
        .await
    }

    async fn create_shipment(
        &self,
        args: &Args<'_>,
        elicitor: &dyn Elicitor,
    ) -> Result<Value, ToolError> {
        let body = args.request_body()?;
        let completed = pipeline::complete(
            &shipment::DOMAIN,
            body,
            &EvaluationMode::default(),
            &self.settings,
            elicitor,
        )
        .await?;

        self.execute(
            SHIPMENT_OPERATION_ID,
            "create_shipment",
            json!({"version": args.str_or("version", "v2409")?}),
            json!({"additionaladdressvalidation": args.optional_str("additionaladdressvalidation")?}),
            Some(completed),
            args,
        )
        .await
    }

    async fn void_shipment(&self, args: &Args<'_>) -> Result<Value, ToolError> {
        let tracking = match args.0.get("trackingnumber") {
            None | Some(Value::Null) => Value::Null,
            Some(Value::String(s)) => json!(s),
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => json!(items),
            Some(_) => {
                return Err(ToolError::InvalidArgument(
                    "trackingnumber must be a string or a list of strings".to_string(),
                ))
            }
        };

        self.execute(
            VOID_SHIPMENT_OPERATION_ID,
            "void_shipment",
            json!({
                "version": args.str_or("version", "v2409")?,
                "shipmentidentificationnumber": args.required_str("shipmentidentificationnumber")?,
            }),
            json!({"trackingnumber": tracking}),
            None,
            args,
        )
        .await
    }

    async fn recover_label(&self, args: &Args<'_>) -> Result<Value, ToolError> {
        let body = args.request_body()?.clone();
        self.execute(
            LABEL_RECOVERY_OPERATION_ID,
            "recover_label",
            json!({"version": args.str_or("version", "v1")?}),
            json!({}),
            Some(body),
            args,
        )
        .await
    }

    async fn get_time_in_transit(&self, args: &Args<'_>) -> Result<Value, ToolError> {
        let body = args.request_body()?.clone();
        self.execute(
            TIME_IN_TRANSIT_OPERATION_ID,
            "get_time_in_transit",
            json!({"version": args.str_or("version", "v1")?}),
            json!({}),
            Some(body),
            args,
        )
        .await
    }

    /// Calls a registry operation, filling declared path defaults under the
    /// given path values.
    async fn execute(
        &self,
        operation_id: &str,
        operation_name: &str,
        path_params: Value,
        query: Value,
        body: Option<Value>,
        args: &Args<'_>,
    ) -> Result<Value, ToolError> {
        let operation = self.registry.get_operation(operation_id)?;
        if operation.deprecated {
            return Err(ToolError::Deprecated(operation.operation_id.clone()));
        }
        if operation.request_body_required && body.is_none() {
            return Err(ToolError::BodyRequired(operation.operation_id.clone()));
        }

        let mut call = OperationCall::new(operation, operation_name)
            .trans_id(args.trans_id()?)
            .transaction_src(self.transaction_src(args)?);
        call.path_params = operation.default_path_values();
        if let Value::Object(explicit) = path_params {
            call.path_params.extend(explicit);
        }
        if let Value::Object(query) = query {
            call.query = query;
        }
        call.body = body;
        self.send(call).await
    }

    async fn send(&self, call: OperationCall<'_>) -> Result<Value, ToolError> {
        let envelope = self.http.call_operation(call).await?;
        Ok(envelope.to_json_value())
    }

    fn transaction_src(&self, args: &Args<'_>) -> Result<Option<String>, ToolError> {
        Ok(args
            .transaction_src()?
            .or_else(|| Some(self.settings.transaction_source.clone())))
    }
}

// ──────────────────────────────────────────────
// Catalog
// ──────────────────────────────────────────────

fn common_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        "trans_id".into(),
        json!({"type": "string", "description": "Optional request id. A UUID is generated when omitted."}),
    );
    props.insert(
        "transaction_src".into(),
        json!({"type": "string", "description": "Optional caller source name.", "default": "ups-mcp"}),
    );
    props
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    let mut props = common_properties();
    if let Value::Object(own) = properties {
        props.extend(own);
    }
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": props,
            "required": required,
        },
    })
}

/// `tools/list` entries.
pub fn tool_definitions() -> Vec<Value> {
    let request_body = json!({"type": "object", "description": "Provider request body as a JSON object."});
    vec![
        tool(
            "track_package",
            "Retrieve the current status and activity history of a shipment by inquiry number.",
            json!({
                "inquiryNumber": {"type": "string", "description": "Package identifier, 7 to 34 characters."},
                "locale": {"type": "string", "default": "en_US"},
                "returnSignature": {"type": "boolean", "default": false},
                "returnMilestones": {"type": "boolean", "default": false},
                "returnPOD": {"type": "boolean", "default": false},
            }),
            &["inquiryNumber"],
        ),
        tool(
            "validate_address",
            "Check a US or Puerto Rico address against the postal service database.",
            json!({
                "addressLine1": {"type": "string"},
                "addressLine2": {"type": "string"},
                "politicalDivision1": {"type": "string", "description": "Two-letter state or province code."},
                "politicalDivision2": {"type": "string", "description": "City or town."},
                "zipPrimary": {"type": "string"},
                "zipExtended": {"type": "string"},
                "urbanization": {"type": "string"},
                "countryCode": {"type": "string"},
            }),
            &["addressLine1", "politicalDivision1", "politicalDivision2", "zipPrimary", "countryCode"],
        ),
        tool(
            "rate_shipment",
            "Rate or shop a shipment. Missing required fields are requested from the user through a form when the client supports it.",
            json!({
                "requestoption": {"type": "string", "enum": ["Rate", "Shop", "Ratetimeintransit", "Shoptimeintransit"]},
                "request_body": request_body,
                "version": {"type": "string", "default": "v2409"},
                "additionalinfo": {"type": "string"},
            }),
            &["requestoption", "request_body"],
        ),
        tool(
            "create_shipment",
            "Create a shipment. Missing required fields are requested from the user through a form when the client supports it.",
            json!({
                "request_body": request_body,
                "version": {"type": "string", "default": "v2409"},
                "additionaladdressvalidation": {"type": "string"},
            }),
            &["request_body"],
        ),
        tool(
            "void_shipment",
            "Void a shipment by shipment identification number.",
            json!({
                "shipmentidentificationnumber": {"type": "string"},
                "version": {"type": "string", "default": "v2409"},
                "trackingnumber": {
                    "oneOf": [{"type": "string"}, {"type": "array", "items": {"type": "string"}}]
                },
            }),
            &["shipmentidentificationnumber"],
        ),
        tool(
            "recover_label",
            "Recover forward or return labels.",
            json!({
                "request_body": request_body,
                "version": {"type": "string", "default": "v1"},
            }),
            &["request_body"],
        ),
        tool(
            "get_time_in_transit",
            "Estimate transit times between an origin and a destination.",
            json!({
                "request_body": request_body,
                "version": {"type": "string", "default": "v1"},
            }),
            &["request_body"],
        ),
    ]
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parcelkit_client::{HttpRequest, HttpResponse};
    use parcelkit_core::{ElicitationResponse, ElicitorError, ErrorCode};
    use std::sync::Mutex;

    /// Issues tokens and answers every operation call with `200 {"ok": true}`.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        pub(crate) fn operation_requests(&self) -> Vec<HttpRequest> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|r| !r.url.contains("/security/"))
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
            let body = if request.url.contains("/security/") {
                r#"{"access_token": "tok", "expires_in": 3600}"#
            } else {
                r#"{"ok": true}"#
            };
            self.sent.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            })
        }
    }

    pub(crate) fn settings() -> Settings {
        Settings {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            account_number: Some("A1B2C3".to_string()),
            transaction_source: "ups-mcp".to_string(),
            ..Settings::default()
        }
    }

    pub(crate) fn complete_rate_body() -> Value {
        json!({"RateRequest": {"Shipment": {
            "Shipper": {"Name": "Acme", "Address": {"AddressLine": ["100 Main St"], "City": "Atlanta",
                "StateProvinceCode": "GA", "PostalCode": "30301", "CountryCode": "US"}},
            "ShipTo": {"Name": "Jane Doe", "Address": {"AddressLine": ["200 Elm St"], "City": "Austin",
                "StateProvinceCode": "TX", "PostalCode": "73301", "CountryCode": "US"}},
            "Service": {"Code": "03"},
            "Package": {"Packaging": {"Code": "02"},
                "PackageWeight": {"UnitOfMeasurement": {"Code": "LBS"}, "Weight": "5"}},
        }}})
    }

    struct NoForms;

    #[async_trait]
    impl Elicitor for NoForms {
        fn supports_form(&self) -> bool {
            false
        }

        async fn elicit(
            &self,
            _message: &str,
            _schema: &Value,
        ) -> Result<ElicitationResponse, ElicitorError> {
            Err(ElicitorError::Transport("not supported".to_string()))
        }
    }

    fn manager() -> (ToolManager, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let manager = ToolManager::with_transport(settings(), transport.clone()).unwrap();
        (manager, transport)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn catalog_lists_seven_tools() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "track_package",
                "validate_address",
                "rate_shipment",
                "create_shipment",
                "void_shipment",
                "recover_label",
                "get_time_in_transit"
            ]
        );
        for tool in tool_definitions() {
            assert!(tool["inputSchema"]["properties"]["trans_id"].is_object());
        }
    }

    #[test]
    fn request_options_are_case_insensitive() {
        assert_eq!(rate_path_option("SHOP").unwrap(), "Shop");
        let err = rate_path_option("cheapest").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid requestoption 'cheapest'. Allowed values: Rate, Ratetimeintransit, Shop, Shoptimeintransit"
        );
    }

    #[tokio::test]
    async fn rate_shipment_remaps_packaging_and_calls_rate() {
        let (manager, transport) = manager();
        let result = manager
            .call_tool(
                "rate_shipment",
                &args(json!({"requestoption": "shop", "request_body": complete_rate_body()})),
                &NoForms,
            )
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(result["operation"], "rate_shipment");

        let sent = transport.operation_requests();
        assert_eq!(sent[0].url, "https://wwwcie.ups.com/api/rating/v2409/Shop");
        let parcelkit_client::RequestBody::Json(body) = &sent[0].body else {
            panic!("expected JSON body");
        };
        let package = &body["RateRequest"]["Shipment"]["Package"][0];
        assert_eq!(package["PackagingType"]["Code"], "02");
        assert!(package.get("Packaging").is_none());
        assert_eq!(
            body["RateRequest"]["Shipment"]["Shipper"]["ShipperNumber"],
            "A1B2C3"
        );
    }

    #[tokio::test]
    async fn incomplete_body_without_form_support_is_unsupported() {
        let (manager, transport) = manager();
        let mut body = complete_rate_body();
        body["RateRequest"]["Shipment"]["Shipper"]
            .as_object_mut()
            .unwrap()
            .remove("Name");
        let err = manager
            .call_tool(
                "rate_shipment",
                &args(json!({"requestoption": "Rate", "request_body": body})),
                &NoForms,
            )
            .await
            .unwrap_err();
        let ToolError::Elicitation(inner) = &err else {
            panic!("unexpected error: {}", err);
        };
        assert_eq!(inner.code, ErrorCode::ElicitationUnsupported);
        assert_eq!(err.to_json_value()["code"], "ELICITATION_UNSUPPORTED");
        assert!(transport.operation_requests().is_empty());
    }

    #[tokio::test]
    async fn void_shipment_repeats_tracking_numbers() {
        let (manager, transport) = manager();
        manager
            .call_tool(
                "void_shipment",
                &args(json!({"shipmentidentificationnumber": "1ZISDE016691676846", "trackingnumber": ["1Z1", "1Z2"]})),
                &NoForms,
            )
            .await
            .unwrap();
        let sent = transport.operation_requests();
        assert_eq!(sent[0].method, "DELETE");
        assert_eq!(
            sent[0].url,
            "https://wwwcie.ups.com/api/shipments/v2409/void/cancel/1ZISDE016691676846?trackingnumber=1Z1&trackingnumber=1Z2"
        );
    }

    #[tokio::test]
    async fn void_shipment_rejects_mixed_tracking_numbers() {
        let (manager, _) = manager();
        let err = manager
            .call_tool(
                "void_shipment",
                &args(json!({"shipmentidentificationnumber": "1Z", "trackingnumber": ["1Z1", 2]})),
                &NoForms,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "trackingnumber must be a string or a list of strings");
        assert_eq!(err.to_json_value()["code"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn validate_address_builds_key_format() {
        let (manager, transport) = manager();
        manager
            .call_tool(
                "validate_address",
                &args(json!({
                    "addressLine1": "26601 ALISO CREEK ROAD",
                    "addressLine2": "",
                    "politicalDivision1": "CA",
                    "politicalDivision2": "ALISO VIEJO",
                    "zipPrimary": "92656",
                    "zipExtended": "",
                    "countryCode": "US",
                })),
                &NoForms,
            )
            .await
            .unwrap();
        let sent = transport.operation_requests();
        assert!(sent[0]
            .url
            .starts_with("https://wwwcie.ups.com/api/addressvalidation/v1/1?"));
        assert!(sent[0].url.contains("maximumcandidatelistsize=3"));
        assert!(sent[0].url.contains("regionalrequestindicator=false"));
        let parcelkit_client::RequestBody::Json(body) = &sent[0].body else {
            panic!("expected JSON body");
        };
        let key_format = &body["XAVRequest"]["AddressKeyFormat"];
        assert_eq!(key_format["AddressLine"], json!(["26601 ALISO CREEK ROAD"]));
        assert!(key_format.get("PostcodeExtendedLow").is_none());
    }

    #[tokio::test]
    async fn track_package_requires_inquiry_number() {
        let (manager, _) = manager();
        let err = manager
            .call_tool("track_package", &Map::new(), &NoForms)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required argument 'inquiryNumber'");
    }

    #[tokio::test]
    async fn unknown_tool() {
        let (manager, _) = manager();
        let err = manager.call_tool("ship_it", &Map::new(), &NoForms).await.unwrap_err();
        assert_eq!(err.to_json_value()["code"], "UNKNOWN_TOOL");
    }

    #[tokio::test]
    async fn recover_label_requires_object_body() {
        let (manager, _) = manager();
        let err = manager
            .call_tool("recover_label", &args(json!({"request_body": "x"})), &NoForms)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "request_body must be a JSON object");
    }
}
