//! Server-to-client requests and the form prompt built on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use parcelkit_core::{ElicitationResponse, Elicitor, ElicitorError};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};

use super::protocol;

/// The connected client: outbound queue, in-flight requests and what it
/// declared at `initialize`.
pub struct Peer {
    outgoing: mpsc::UnboundedSender<Value>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_id: AtomicU64,
    /// Set once input has ended; no request may register after it.
    closed: AtomicBool,
    capabilities: RwLock<Value>,
}

impl Peer {
    pub fn new(outgoing: mpsc::UnboundedSender<Value>) -> Self {
        Peer {
            outgoing,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            capabilities: RwLock::new(Value::Null),
        }
    }

    /// Queues a message for the writer. False once the writer is gone.
    pub fn send(&self, message: Value) -> bool {
        self.outgoing.send(message).is_ok()
    }

    pub fn set_capabilities(&self, capabilities: Value) {
        if let Ok(mut current) = self.capabilities.write() {
            *current = capabilities;
        }
    }

    pub fn supports_form(&self) -> bool {
        self.capabilities
            .read()
            .map(|caps| parcelkit_core::supports_form(&caps))
            .unwrap_or(false)
    }

    /// Sends a request and waits for the client's `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| "pending request table poisoned".to_string())?;
            if self.closed.load(Ordering::SeqCst) {
                return Err("client connection closed".to_string());
            }
            pending.insert(id, tx);
        }

        if !self.send(protocol::request(id, method, params)) {
            self.forget(id);
            return Err("client connection closed".to_string());
        }

        let response = rx
            .await
            .map_err(|_| "client disconnected before responding".to_string())?;
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("client returned an error: {}", message));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Routes a client response to its waiting request. False for unknown ids.
    pub fn resolve(&self, response: Value) -> bool {
        let Some(id) = response.get("id").and_then(Value::as_u64) else {
            return false;
        };
        let waiter = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&id),
            Err(_) => None,
        };
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Fails every in-flight request and refuses new ones.
    pub fn drop_pending(&self) {
        match self.pending.lock() {
            Ok(mut pending) => {
                self.closed.store(true, Ordering::SeqCst);
                pending.clear();
            }
            Err(_) => self.closed.store(true, Ordering::SeqCst),
        }
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

/// Prompts through `elicitation/create` on the connected client.
pub struct ClientElicitor {
    peer: Arc<Peer>,
}

impl ClientElicitor {
    pub fn new(peer: Arc<Peer>) -> Self {
        ClientElicitor { peer }
    }
}

#[async_trait]
impl Elicitor for ClientElicitor {
    fn supports_form(&self) -> bool {
        self.peer.supports_form()
    }

    async fn elicit(
        &self,
        message: &str,
        schema: &Value,
    ) -> Result<ElicitationResponse, ElicitorError> {
        let result = self
            .peer
            .request(
                "elicitation/create",
                json!({"message": message, "requestedSchema": schema}),
            )
            .await
            .map_err(ElicitorError::Transport)?;
        parse_elicit_result(&result)
    }
}

fn parse_elicit_result(result: &Value) -> Result<ElicitationResponse, ElicitorError> {
    match result.get("action").and_then(Value::as_str) {
        Some("accept") => {
            let content = match result.get("content") {
                Some(Value::Object(content)) => content.clone(),
                Some(Value::Null) | None => Map::new(),
                Some(_) => {
                    return Err(ElicitorError::Transport(
                        "elicitation content must be an object".to_string(),
                    ))
                }
            };
            Ok(ElicitationResponse::Accepted(content))
        }
        Some("decline") => Ok(ElicitationResponse::Declined),
        Some("cancel") => Ok(ElicitationResponse::Cancelled),
        Some(other) => Err(ElicitorError::Transport(format!(
            "unknown elicitation action '{}'",
            other
        ))),
        None => Err(ElicitorError::Transport(
            "elicitation result has no action".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_responses() {
        let accepted = parse_elicit_result(&json!({"action": "accept", "content": {"a": 1}}));
        assert!(matches!(accepted, Ok(ElicitationResponse::Accepted(c)) if c["a"] == 1));
        assert!(matches!(
            parse_elicit_result(&json!({"action": "decline"})),
            Ok(ElicitationResponse::Declined)
        ));
        assert!(matches!(
            parse_elicit_result(&json!({"action": "cancel"})),
            Ok(ElicitationResponse::Cancelled)
        ));
        assert!(parse_elicit_result(&json!({"action": "maybe"})).is_err());
        assert!(parse_elicit_result(&json!({})).is_err());
    }

    #[test]
    fn capabilities_gate_form_support() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = Peer::new(tx);
        assert!(!peer.supports_form());
        peer.set_capabilities(json!({"elicitation": {}}));
        assert!(peer.supports_form());
        peer.set_capabilities(json!({"elicitation": {"url": {}}}));
        assert!(!peer.supports_form());
    }

    #[tokio::test]
    async fn request_resolves_with_matching_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Peer::new(tx));

        let waiter = {
            let peer = peer.clone();
            tokio::spawn(async move { peer.request("ping", json!({})).await })
        };
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent["method"], "ping");
        assert!(!peer.resolve(json!({"jsonrpc": "2.0", "id": 999, "result": {}})));
        assert!(peer.resolve(json!({"jsonrpc": "2.0", "id": sent["id"], "result": {"pong": true}})));
        assert_eq!(waiter.await.unwrap().unwrap(), json!({"pong": true}));
    }

    #[tokio::test]
    async fn dropped_requests_report_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Peer::new(tx));
        let waiter = {
            let peer = peer.clone();
            tokio::spawn(async move { peer.request("elicitation/create", json!({})).await })
        };
        rx.recv().await.unwrap();
        peer.drop_pending();
        let err = waiter.await.unwrap().unwrap_err();
        assert_eq!(err, "client disconnected before responding");
    }

    #[tokio::test]
    async fn requests_after_close_fail_without_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Peer::new(tx);
        peer.drop_pending();
        let err = peer.request("elicitation/create", json!({})).await.unwrap_err();
        assert_eq!(err, "client connection closed");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn client_errors_surface_as_transport_failures() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Peer::new(tx));
        let elicitor = ClientElicitor::new(peer.clone());
        let pending = tokio::spawn(async move { elicitor.elicit("msg", &json!({})).await });
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent["params"]["message"], "msg");
        peer.resolve(json!({"jsonrpc": "2.0", "id": sent["id"],
                            "error": {"code": -1, "message": "nope"}}));
        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ElicitorError::Transport(msg) if msg.contains("nope")));
    }
}
