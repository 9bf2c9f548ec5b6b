//! Operation calls and the response envelope.
//!
//! Every call, successful or not, comes back as an [`Envelope`] with the same
//! shape so tool callers can branch on `ok` and `error.code` without knowing
//! which provider API produced the response. Only missing credentials escape
//! as a `ClientError`.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::auth::TokenManager;
use crate::error::ClientError;
use crate::registry::OperationSpec;
use crate::transport::{HttpRequest, RequestBody, Transport};

pub const DEFAULT_TRANSACTION_SOURCE: &str = "ups-mcp";

static PATH_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

// ──────────────────────────────────────────────
// Envelope
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub method: Option<String>,
    pub path: Option<String>,
    pub query: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

/// Uniform result of an operation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub ok: bool,
    pub operation: String,
    pub status_code: u16,
    pub trans_id: Option<String>,
    pub request: RequestSummary,
    pub data: Option<Value>,
    pub error: Option<EnvelopeError>,
}

impl Envelope {
    /// A request rejected before anything was sent.
    pub fn validation_error(
        operation_name: &str,
        message: impl Into<String>,
        trans_id: Option<String>,
    ) -> Self {
        Envelope {
            ok: false,
            operation: operation_name.to_string(),
            status_code: 0,
            trans_id,
            request: RequestSummary {
                method: None,
                path: None,
                query: Map::new(),
            },
            data: None,
            error: Some(EnvelopeError {
                code: "VALIDATION_ERROR".to_string(),
                message: message.into(),
                details: None,
            }),
        }
    }

    pub fn to_json_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ──────────────────────────────────────────────
// OperationCall
// ──────────────────────────────────────────────

/// Arguments for one call of a registered operation.
#[derive(Debug, Clone)]
pub struct OperationCall<'a> {
    pub operation: &'a OperationSpec,
    /// Name reported in the envelope, usually the tool name.
    pub operation_name: &'a str,
    pub path_params: Map<String, Value>,
    /// Null values are dropped before sending.
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub trans_id: Option<String>,
    pub transaction_src: Option<String>,
}

impl<'a> OperationCall<'a> {
    pub fn new(operation: &'a OperationSpec, operation_name: &'a str) -> Self {
        OperationCall {
            operation,
            operation_name,
            path_params: Map::new(),
            query: Map::new(),
            body: None,
            trans_id: None,
            transaction_src: None,
        }
    }

    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.to_string(), value.into());
        self
    }

    pub fn query_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.query.insert(name.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Blank ids are treated as absent.
    pub fn trans_id(mut self, trans_id: Option<String>) -> Self {
        self.trans_id = trans_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn transaction_src(mut self, source: Option<String>) -> Self {
        self.transaction_src = source.filter(|src| !src.trim().is_empty());
        self
    }
}

// ──────────────────────────────────────────────
// HttpClient
// ──────────────────────────────────────────────

pub struct HttpClient {
    base_url: String,
    tokens: Arc<TokenManager>,
    transport: Arc<dyn Transport>,
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        HttpClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn call_operation(&self, call: OperationCall<'_>) -> Result<Envelope, ClientError> {
        let trans_id = call
            .trans_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let transaction_src = call
            .transaction_src
            .clone()
            .unwrap_or_else(|| DEFAULT_TRANSACTION_SOURCE.to_string());
        let query: Map<String, Value> = call
            .query
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();

        let path = match render_path(&call.operation.path, &call.path_params) {
            Ok(path) => path,
            Err(missing) => {
                return Ok(Envelope::validation_error(
                    call.operation_name,
                    format!("Missing required path parameter: {}", missing),
                    Some(trans_id),
                ))
            }
        };

        let summary = RequestSummary {
            method: Some(call.operation.method.clone()),
            path: Some(path.clone()),
            query: query.clone(),
        };

        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(ClientError::MissingCredentials) => return Err(ClientError::MissingCredentials),
            Err(err) => return Ok(transport_failure(call.operation_name, trans_id, summary, &err)),
        };

        let mut url = format!("{}/api{}", self.base_url, path);
        let query_string = encode_query(&query);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        let request = HttpRequest::new(&call.operation.method, url)
            .header("Authorization", format!("Bearer {}", token))
            .header("transId", trans_id.clone())
            .header("transactionSrc", transaction_src)
            .body(call.body.map_or(RequestBody::Empty, RequestBody::Json));

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    operation = call.operation.operation_id.as_str(),
                    error = %err,
                    "request failed"
                );
                return Ok(transport_failure(call.operation_name, trans_id, summary, &err));
            }
        };

        tracing::info!(
            operation = call.operation.operation_id.as_str(),
            method = call.operation.method.as_str(),
            status = response.status,
            "operation call completed"
        );

        let payload = parse_payload(&response.body);
        let envelope = if response.is_success() {
            Envelope {
                ok: true,
                operation: call.operation_name.to_string(),
                status_code: response.status,
                trans_id: Some(trans_id),
                request: summary,
                data: payload,
                error: None,
            }
        } else {
            Envelope {
                ok: false,
                operation: call.operation_name.to_string(),
                status_code: response.status,
                trans_id: Some(trans_id),
                request: summary,
                data: None,
                error: Some(EnvelopeError {
                    code: error_code(payload.as_ref(), response.status),
                    message: error_message(payload.as_ref(), response.status),
                    details: payload,
                }),
            }
        };
        Ok(envelope)
    }
}

fn transport_failure(
    operation_name: &str,
    trans_id: String,
    request: RequestSummary,
    err: &ClientError,
) -> Envelope {
    Envelope {
        ok: false,
        operation: operation_name.to_string(),
        status_code: 0,
        trans_id: Some(trans_id),
        request,
        data: None,
        error: Some(EnvelopeError {
            code: "REQUEST_ERROR".to_string(),
            message: err.to_string(),
            details: None,
        }),
    }
}

// ──────────────────────────────────────────────
// Request rendering
// ──────────────────────────────────────────────

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitutes `{name}` tokens with percent-encoded values. Returns the first
/// token with no value.
fn render_path(template: &str, params: &Map<String, Value>) -> Result<String, String> {
    let mut missing = None;
    let rendered = PATH_TOKEN.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => urlencoding::encode(&param_text(value)).into_owned(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(name),
        None => Ok(rendered.into_owned()),
    }
}

/// Arrays repeat their key once per element.
fn encode_query(query: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        let values: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        for item in values {
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&param_text(item))
            ));
        }
    }
    pairs.join("&")
}

// ──────────────────────────────────────────────
// Response interpretation
// ──────────────────────────────────────────────

fn parse_payload(body: &str) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Some(value);
    }
    let text = body.trim();
    (!text.is_empty()).then(|| json!({"raw": text}))
}

fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(param_text(other)),
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn error_code(payload: Option<&Value>, status: u16) -> String {
    let Some(Value::Object(map)) = payload else {
        return status.to_string();
    };
    ["code", "errorCode", "statusCode"]
        .iter()
        .find_map(|key| map.get(*key).and_then(truthy_text))
        .or_else(|| {
            map.get("response")
                .and_then(|nested| nested.get("status"))
                .and_then(|status| status.get("code"))
                .and_then(truthy_text)
        })
        .unwrap_or_else(|| status.to_string())
}

fn error_message(payload: Option<&Value>, status: u16) -> String {
    let fallback = || format!("UPS API returned HTTP {}", status);
    let Some(Value::Object(map)) = payload else {
        return fallback();
    };
    if let Some(message) = ["message", "error", "detail"]
        .iter()
        .find_map(|key| non_blank(map.get(*key)))
    {
        return message;
    }
    let Some(nested) = map.get("response").filter(|n| n.is_object()) else {
        return fallback();
    };
    let first_error = nested
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());
    if let Some(first) = first_error {
        let message = match first {
            Value::Object(_) => non_blank(first.get("message")),
            Value::String(_) => non_blank(Some(first)),
            _ => None,
        };
        if let Some(message) = message {
            return message;
        }
    }
    non_blank(nested.get("status").and_then(|s| s.get("description"))).unwrap_or_else(fallback)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
