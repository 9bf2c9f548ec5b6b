//! Client-credentials OAuth tokens.
//!
//! One [`TokenManager`] is shared by every in-flight tool call. The cached
//! token sits behind a `tokio::sync::Mutex`; a caller that finds it stale
//! refreshes while holding the lock, so callers queued behind it re-check and
//! reuse the new token instead of issuing their own request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ClientError;
use crate::transport::{HttpRequest, RequestBody, Transport};

/// A cached token is reused only while more than this much lifetime remains.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

pub struct TokenManager {
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    transport: Arc<dyn Transport>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        token_url: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        TokenManager {
            token_url: token_url.into(),
            client_id,
            client_secret,
            transport,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, fetching a new one when the cache is empty or
    /// within [`REFRESH_MARGIN`] of expiry.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Instant::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, ClientError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => return Err(ClientError::MissingCredentials),
        };

        tracing::debug!(token_url = %self.token_url, "requesting access token");
        let credentials = STANDARD.encode(format!("{}:{}", client_id, client_secret));
        let request = HttpRequest::new("POST", &self.token_url)
            .header("Authorization", format!("Basic {}", credentials))
            .body(RequestBody::Form(vec![(
                "grant_type".to_string(),
                "client_credentials".to_string(),
            )]));

        let requested_at = Instant::now();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "token request rejected");
            return Err(ClientError::TokenStatus {
                status: response.status,
            });
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| ClientError::TokenResponse(e.to_string()))?;
        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::TokenResponse("missing access_token".to_string()))?
            .to_string();
        let lifetime = expires_in(payload.get("expires_in"))?;

        tracing::info!(expires_in = lifetime.as_secs(), "access token refreshed");
        Ok(CachedToken {
            access_token,
            expires_at: requested_at + lifetime,
        })
    }
}

/// `expires_in` arrives as either a number or a numeric string. Absent means
/// the token must not be reused.
fn expires_in(value: Option<&Value>) -> Result<Duration, ClientError> {
    let seconds = match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| ClientError::TokenResponse(format!("invalid expires_in: {}", n)))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| ClientError::TokenResponse(format!("invalid expires_in: {}", s)))?,
        Some(other) => {
            return Err(ClientError::TokenResponse(format!(
                "invalid expires_in: {}",
                other
            )))
        }
    };
    Ok(Duration::from_secs(seconds))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
