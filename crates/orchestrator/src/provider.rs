//! OpenAI-compatible streaming chat completions.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use roster_config::ChatConfig;

use crate::error::RelayError;
use crate::mcp::McpTool;
use crate::sse::SseDecoder;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ProviderToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ProviderMessage {
    fn with_content(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_content("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_content("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_content("assistant", content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ProviderToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ProviderFunctionCall,
}

impl ProviderToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: ProviderFunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ProviderFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

impl From<&McpTool> for ProviderTool {
    fn from(tool: &McpTool) -> Self {
        let parameters = match &tool.input_schema {
            Value::Object(_) => tool.input_schema.clone(),
            _ => json!({ "type": "object", "properties": {} }),
        };
        Self {
            kind: "function",
            function: ProviderFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ProviderTool>,
    pub stream: bool,
}

/// Increments decoded from the provider's stream, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    TextDelta(String),
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
    Finish {
        reason: String,
    },
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent, RelayError>> + Send>>;

#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl CompletionClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_config(http: Client, config: &ChatConfig) -> Self {
        Self::new(
            http,
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Open a streaming completion. Non-success statuses are returned as errors
    /// before any event is produced.
    pub async fn stream(
        &self,
        messages: Vec<ProviderMessage>,
        tools: Vec<ProviderTool>,
    ) -> Result<CompletionStream, RelayError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            tools,
            stream: true,
        };
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "opening completion stream"
        );

        let mut builder = self
            .http
            .post(self.endpoint())
            .header(ACCEPT, "text/event-stream")
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RelayError::ProviderStatus {
                status: status.as_u16(),
                message: summarize_error_body(&body),
            });
        }

        Ok(decode_completion_stream(response.bytes_stream()))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct DecodeState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<ProviderEvent, RelayError>>,
    done: bool,
}

impl DecodeState {
    fn absorb(&mut self, data: &str) {
        if self.done {
            return;
        }
        let payload = data.trim();
        if payload.is_empty() {
            return;
        }
        if payload == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<ChunkPayload>(payload) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    let message = extract_error_summary(&json!({ "error": error }))
                        .unwrap_or_else(|| "provider reported an error".to_string());
                    self.fail(message);
                    return;
                }
                self.pending.extend(chunk.into_events().into_iter().map(Ok));
            }
            Err(err) => self.fail(format!("invalid provider chunk: {err}")),
        }
    }

    fn fail(&mut self, message: String) {
        self.pending.push_back(Err(RelayError::ProviderStream(message)));
        self.done = true;
    }
}

/// Turn a raw SSE byte stream into provider events.
pub fn decode_completion_stream<S>(bytes: S) -> CompletionStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    let stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(&chunk) {
                        state.absorb(&event.data);
                    }
                }
                Some(Err(err)) => state.fail(err.to_string()),
                None => {
                    for event in state.decoder.finish() {
                        state.absorb(&event.data);
                    }
                    state.done = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl ChunkPayload {
    fn into_events(self) -> Vec<ProviderEvent> {
        let mut events = Vec::new();
        let Some(choice) = self.choices.into_iter().next() else {
            return events;
        };

        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content.filter(|content| !content.is_empty()) {
                events.push(ProviderEvent::TextDelta(content));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match call.function {
                    Some(function) => (function.name, function.arguments),
                    None => (None, None),
                };
                events.push(ProviderEvent::ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                });
            }
        }

        if let Some(reason) = choice.finish_reason {
            events.push(ProviderEvent::Finish { reason });
        }
        events
    }
}

fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Short single-line description of an error body.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}
