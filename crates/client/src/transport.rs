//! The HTTP seam.
//!
//! Token and operation calls both go through [`Transport`], so tests can
//! script responses without a network. The production implementation uses
//! `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid blocking
//! the async runtime.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;

/// Outgoing request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
}

/// A fully rendered request: the URL already carries its query string.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        HttpRequest {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body text. Non-2xx statuses are responses, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request. `Err` means no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// [`Transport`] backed by a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(std::time::Duration::from_secs(30)))
            .build();
        UreqTransport {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        UreqTransport::new()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, &request))
            .await
            .map_err(|e| ClientError::Transport(format!("task join error: {}", e)))?
    }
}

fn execute(agent: &ureq::Agent, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
    let url = request.url.as_str();
    let result = match request.method.as_str() {
        "POST" | "PUT" | "PATCH" => {
            let mut builder = match request.method.as_str() {
                "POST" => agent.post(url),
                "PUT" => agent.put(url),
                _ => agent.patch(url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            match &request.body {
                RequestBody::Json(value) => builder.send_json(value),
                RequestBody::Form(pairs) => builder.send_form(
                    pairs
                        .iter()
                        .map(|(key, value)| (key.as_str(), value.as_str())),
                ),
                RequestBody::Empty => builder.send_empty(),
            }
        }
        method => {
            let mut builder = match method {
                "DELETE" => agent.delete(url),
                "HEAD" => agent.head(url),
                "OPTIONS" => agent.options(url),
                _ => agent.get(url),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder.call()
        }
    };

    let response = result.map_err(|e| ClientError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|e| ClientError::Transport(format!("failed to read response body: {}", e)))?;
    Ok(HttpResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_is_uppercased() {
        let request = HttpRequest::new("post", "https://example.test/x");
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, RequestBody::Empty);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let request = HttpRequest::new("GET", "u").header("transId", "abc");
        assert_eq!(request.header_value("TRANSID"), Some("abc"));
        assert_eq!(request.header_value("missing"), None);
    }

    #[test]
    fn success_range() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let bad = HttpResponse {
            status: 400,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
