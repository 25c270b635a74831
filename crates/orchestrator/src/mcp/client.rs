//! Discovery client for a tool server speaking the SSE transport.
//!
//! The client opens `GET <url>` as an event stream, waits for the `endpoint`
//! event naming where to POST messages, and then matches `message` events to
//! pending requests by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::RelayError;
use crate::mcp::protocol::{JsonRpcMessage, McpTool, PROTOCOL_VERSION};
use crate::sse::{is_event_stream_content_type, SseDecoder};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type PendingRequests = Arc<Mutex<HashMap<i64, oneshot::Sender<JsonRpcMessage>>>>;

pub struct McpClient {
    http: Client,
    endpoint: Url,
    headers: HeaderMap,
    pending: PendingRequests,
    next_id: AtomicI64,
    reader: JoinHandle<()>,
    closed: AtomicBool,
    request_timeout: Duration,
    tools: Vec<McpTool>,
}

impl McpClient {
    /// Connect, complete the initialize handshake and fetch the tool list.
    pub async fn connect(
        http: Client,
        url: Url,
        headers: &HashMap<String, String>,
    ) -> Result<Self, RelayError> {
        Self::connect_with_timeout(http, url, headers, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        http: Client,
        url: Url,
        headers: &HashMap<String, String>,
        request_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let headers = header_map(headers);

        let response = http
            .get(url.clone())
            .headers(headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| RelayError::Discovery(format!("failed to connect to {url}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Discovery(format!("{url} returned {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !is_event_stream_content_type(content_type) {
            return Err(RelayError::Discovery(format!(
                "{url} answered with `{content_type}` instead of an event stream"
            )));
        }

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(read_events(
            response.bytes_stream(),
            endpoint_tx,
            pending.clone(),
        ));

        let endpoint = match tokio::time::timeout(request_timeout, endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                reader.abort();
                return Err(RelayError::Discovery(format!(
                    "{url} closed before announcing an endpoint"
                )));
            }
            Err(_) => {
                reader.abort();
                return Err(RelayError::Discovery(format!(
                    "{url} did not announce an endpoint in time"
                )));
            }
        };

        let endpoint = match url.join(&endpoint) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                reader.abort();
                return Err(RelayError::Discovery(format!(
                    "invalid endpoint `{endpoint}`: {err}"
                )));
            }
        };
        debug!(%endpoint, "tool server announced message endpoint");

        let mut client = Self {
            http,
            endpoint,
            headers,
            pending,
            next_id: AtomicI64::new(1),
            reader,
            closed: AtomicBool::new(false),
            request_timeout,
            tools: Vec::new(),
        };

        client.initialize().await?;
        client.tools = client.list_tools().await?;
        debug!(count = client.tools.len(), "discovered tools");
        Ok(client)
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke a tool; returns the raw call result (`content`, `isError`, ...).
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, RelayError> {
        self.request(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// Stop reading the event stream. Safe to call more than once.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.reader.abort();
            debug!(endpoint = %self.endpoint, "tool discovery connection closed");
        }
    }

    async fn initialize(&self) -> Result<(), RelayError> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "roster-chat-relay",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;
        debug!(
            server = ?result.pointer("/serverInfo/name"),
            "tool server initialised"
        );

        self.notify("notifications/initialized", None).await
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, RelayError> {
        let result = self.request("tools/list", Some(json!({}))).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(tools)
            .map_err(|err| RelayError::Discovery(format!("invalid tools/list result: {err}")))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, RelayError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(err) = self.post(&JsonRpcMessage::request(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(RelayError::Discovery(
                    "tool server closed the connection".to_string(),
                ))
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(RelayError::Discovery(format!(
                    "timed out waiting for {method}"
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(RelayError::Protocol {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RelayError> {
        self.post(&JsonRpcMessage::notification(method, params)).await
    }

    async fn post(&self, message: &JsonRpcMessage) -> Result<(), RelayError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(message)
            .send()
            .await
            .map_err(|err| RelayError::Discovery(format!("failed to send message: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Discovery(format!(
                "message endpoint returned {status}"
            )));
        }
        Ok(())
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_events<S>(
    stream: S,
    endpoint_tx: oneshot::Sender<String>,
    pending: PendingRequests,
) where
    S: futures_util::Stream<Item = reqwest::Result<bytes::Bytes>>,
{
    futures_util::pin_mut!(stream);
    let mut decoder = SseDecoder::default();
    let mut endpoint_tx = Some(endpoint_tx);

    loop {
        let events = match stream.next().await {
            Some(Ok(chunk)) => decoder.push(&chunk),
            Some(Err(err)) => {
                warn!(error = %err, "tool discovery stream failed");
                break;
            }
            None => {
                let events = decoder.finish();
                dispatch_events(events, &mut endpoint_tx, &pending).await;
                break;
            }
        };
        dispatch_events(events, &mut endpoint_tx, &pending).await;
    }

    // Dropping the senders wakes every waiter with a closed-connection error.
    pending.lock().await.clear();
}

async fn dispatch_events(
    events: Vec<crate::sse::SseEvent>,
    endpoint_tx: &mut Option<oneshot::Sender<String>>,
    pending: &PendingRequests,
) {
    for event in events {
        match event.event.as_deref() {
            Some("endpoint") => {
                if let Some(tx) = endpoint_tx.take() {
                    let _ = tx.send(event.data.trim().to_string());
                }
            }
            None | Some("message") => {
                let message = match serde_json::from_str::<JsonRpcMessage>(&event.data) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(error = %err, "ignoring undecodable tool server message");
                        continue;
                    }
                };
                let Some(id) = message.id.as_ref().and_then(Value::as_i64) else {
                    debug!(method = ?message.method, "ignoring tool server message without id");
                    continue;
                };
                if !message.is_response() {
                    debug!(method = ?message.method, "ignoring server-initiated request");
                    continue;
                }
                if let Some(waiter) = pending.lock().await.remove(&id) {
                    let _ = waiter.send(message);
                }
            }
            Some(other) => debug!(event = other, "ignoring tool server event"),
        }
    }
}

fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid discovery header"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_headers_are_skipped() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        headers.insert("bad header".to_string(), "x".to_string());

        let map = header_map(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["authorization"], "Bearer abc");
    }
}
