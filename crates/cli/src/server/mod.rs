//! `parcelkit serve`: the tool server over line-delimited JSON-RPC on stdio.
//!
//! Requests run concurrently so a tool call waiting on an
//! `elicitation/create` round trip never blocks the reader that delivers the
//! client's answer. All output goes through one writer task.

pub mod elicitor;
pub mod protocol;

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::tools::{tool_definitions, ToolManager};
use elicitor::{ClientElicitor, Peer};
use protocol::{error_response, success_response, RpcError};

/// Serves until `reader` reaches EOF, then lets in-flight requests finish.
pub async fn serve<R, W>(tools: Arc<ToolManager>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_messages(writer, rx));
    let peer = Arc::new(Peer::new(tx));
    let mut in_flight = JoinSet::new();

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let incoming: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                peer.send(error_response(
                    Value::Null,
                    RpcError::parse_error(format!("Parse error: {}", e)),
                ));
                continue;
            }
        };
        dispatch(&tools, &peer, &mut in_flight, incoming);
    }

    tracing::info!("client closed input, shutting down");
    peer.drop_pending();
    while in_flight.join_next().await.is_some() {}
    drop(peer);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e)),
    }
}

async fn write_messages<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message).map_err(io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn dispatch(
    tools: &Arc<ToolManager>,
    peer: &Arc<Peer>,
    in_flight: &mut JoinSet<()>,
    incoming: Value,
) {
    let Some(obj) = incoming.as_object() else {
        peer.send(error_response(
            Value::Null,
            RpcError::invalid_request("Request must be a JSON object"),
        ));
        return;
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(protocol::JSONRPC_VERSION) {
        let id = obj.get("id").cloned().unwrap_or(Value::Null);
        peer.send(error_response(
            id,
            RpcError::invalid_request("jsonrpc must be '2.0'"),
        ));
        return;
    }

    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        // A response to one of our own requests.
        if !peer.resolve(incoming.clone()) {
            tracing::debug!(id = ?obj.get("id"), "response for unknown request");
        }
        return;
    };
    let params = obj.get("params").cloned().unwrap_or(Value::Null);

    let Some(id) = obj.get("id").cloned() else {
        tracing::debug!(method, "notification");
        return;
    };

    // Handled inline so capabilities are recorded before any later call runs.
    if method == "initialize" {
        peer.set_capabilities(params.get("capabilities").cloned().unwrap_or(Value::Null));
        tracing::info!(form_elicitation = peer.supports_form(), "client initialized");
        peer.send(success_response(id, protocol::initialize_payload()));
        return;
    }

    let method = method.to_string();
    let tools = tools.clone();
    let peer = peer.clone();
    in_flight.spawn(async move {
        let response = match handle_request(&tools, &peer, &method, params).await {
            Ok(result) => success_response(id, result),
            Err(err) => error_response(id, err),
        };
        peer.send(response);
    });
}

async fn handle_request(
    tools: &ToolManager,
    peer: &Arc<Peer>,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    match method {
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => Ok(protocol::tools_list_payload(tool_definitions())),
        "tools/call" => {
            let (name, args) = protocol::tool_call_params(&params)?;
            let elicitor = ClientElicitor::new(peer.clone());
            Ok(match tools.call_tool(&name, &args, &elicitor).await {
                Ok(envelope) => {
                    let failed = envelope.get("ok").and_then(Value::as_bool) == Some(false);
                    protocol::tool_result(&envelope, failed)
                }
                Err(err) => {
                    tracing::warn!(tool = %name, error = %err, "tool call failed");
                    protocol::tool_result(&err.to_json_value(), true)
                }
            })
        }
        _ => Err(RpcError::method_not_found(method)),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::{complete_rate_body, settings, RecordingTransport};
    use serde_json::json;
    use tokio::io::{BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, message: Value) {
            let mut line = serde_json::to_vec(&message).unwrap();
            line.push(b'\n');
            self.writer.write_all(&line).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn initialize(&mut self, capabilities: Value) {
            self.send(json!({"jsonrpc": "2.0", "id": 0, "method": "initialize",
                             "params": {"capabilities": capabilities}}))
                .await;
            let reply = self.recv().await;
            assert_eq!(reply["result"]["serverInfo"]["name"], "parcelkit");
        }
    }

    fn start() -> (Client, Arc<RecordingTransport>, tokio::task::JoinHandle<io::Result<()>>) {
        let transport = Arc::new(RecordingTransport::default());
        let tools = Arc::new(ToolManager::with_transport(settings(), transport.clone()).unwrap());
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_end);
        let handle = tokio::spawn(serve(tools, BufReader::new(server_read), server_write));
        let (client_read, client_write) = tokio::io::split(client_end);
        let client = Client {
            lines: BufReader::new(client_read).lines(),
            writer: client_write,
        };
        (client, transport, handle)
    }

    fn tool_payload(response: &Value) -> Value {
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    fn rate_call_without_shipper_name(id: u64) -> Value {
        let mut body = complete_rate_body();
        body["RateRequest"]["Shipment"]["Shipper"]
            .as_object_mut()
            .unwrap()
            .remove("Name");
        json!({"jsonrpc": "2.0", "id": id, "method": "tools/call", "params": {
            "name": "rate_shipment",
            "arguments": {"requestoption": "Rate", "request_body": body},
        }})
    }

    #[tokio::test]
    async fn lists_tools_and_rejects_unknown_methods() {
        let (mut client, _, _) = start();
        client.initialize(json!({})).await;

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 7);

        client
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn malformed_messages_get_error_responses() {
        let (mut client, _, _) = start();
        client.writer.write_all(b"{not json\n").await.unwrap();
        assert_eq!(client.recv().await["error"]["code"], -32700);

        client
            .send(json!({"jsonrpc": "1.0", "id": 5, "method": "ping"}))
            .await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn elicits_missing_fields_from_the_client() {
        let (mut client, transport, _) = start();
        client.initialize(json!({"elicitation": {"form": {}}})).await;
        client.send(rate_call_without_shipper_name(7)).await;

        let prompt = client.recv().await;
        assert_eq!(prompt["method"], "elicitation/create");
        assert!(prompt["params"]["requestedSchema"]["properties"]["shipper_name"].is_object());
        client
            .send(json!({"jsonrpc": "2.0", "id": prompt["id"],
                         "result": {"action": "accept", "content": {"shipper_name": "Acme"}}}))
            .await;

        let reply = client.recv().await;
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["result"]["isError"], false);
        assert_eq!(tool_payload(&reply)["operation"], "rate_shipment");
        assert_eq!(transport.operation_requests().len(), 1);
    }

    #[tokio::test]
    async fn declined_prompt_is_a_tool_error() {
        let (mut client, transport, _) = start();
        client.initialize(json!({"elicitation": {}})).await;
        client.send(rate_call_without_shipper_name(8)).await;

        let prompt = client.recv().await;
        client
            .send(json!({"jsonrpc": "2.0", "id": prompt["id"], "result": {"action": "decline"}}))
            .await;

        let reply = client.recv().await;
        assert_eq!(reply["result"]["isError"], true);
        assert_eq!(tool_payload(&reply)["code"], "ELICITATION_DECLINED");
        assert!(transport.operation_requests().is_empty());
    }

    #[tokio::test]
    async fn without_form_support_the_call_fails_fast() {
        let (mut client, _, _) = start();
        client.initialize(json!({})).await;
        client.send(rate_call_without_shipper_name(9)).await;

        let reply = client.recv().await;
        assert_eq!(reply["id"], 9);
        let payload = tool_payload(&reply);
        assert_eq!(payload["code"], "ELICITATION_UNSUPPORTED");
        assert_eq!(payload["missing"][0]["flat_key"], "shipper_name");
    }

    #[tokio::test]
    async fn eof_fails_pending_prompts_and_stops() {
        let (mut client, _, handle) = start();
        client.initialize(json!({"elicitation": {}})).await;
        client.send(rate_call_without_shipper_name(10)).await;
        let prompt = client.recv().await;
        assert_eq!(prompt["method"], "elicitation/create");

        client.writer.shutdown().await.unwrap();
        let reply = client.recv().await;
        assert_eq!(reply["id"], 10);
        assert_eq!(tool_payload(&reply)["code"], "ELICITATION_FAILED");
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn eof_right_after_a_call_still_terminates() {
        let (mut client, _, handle) = start();
        client.initialize(json!({"elicitation": {}})).await;
        client.send(rate_call_without_shipper_name(11)).await;
        client.writer.shutdown().await.unwrap();

        let finished = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let reply = loop {
                let message = client.recv().await;
                if message.get("method").is_none() {
                    break message;
                }
            };
            handle.await.unwrap().unwrap();
            reply
        })
        .await
        .expect("server hung after input closed");
        assert_eq!(finished["id"], 11);
        assert_eq!(tool_payload(&finished)["code"], "ELICITATION_FAILED");
    }
}
