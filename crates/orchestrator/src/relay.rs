//! Drives provider completions and turns them into UI stream parts.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use roster_config::ChatConfig;

use crate::error::RelayError;
use crate::mcp::McpClient;
use crate::message::{convert_to_provider_messages, UiMessage};
use crate::provider::{
    CompletionClient, CompletionStream, ProviderEvent, ProviderMessage, ProviderTool,
    ProviderToolCall,
};
use crate::stream::UiStreamPart;

const PART_BUFFER: usize = 64;
const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(30);
// Stand-in deadline for limits too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

pub struct ChatRelay {
    client: CompletionClient,
    max_steps: u32,
    max_duration: Duration,
}

impl ChatRelay {
    pub fn new(client: CompletionClient, max_steps: u32) -> Self {
        Self {
            client,
            max_steps: max_steps.max(1),
            max_duration: DEFAULT_MAX_DURATION,
        }
    }

    pub fn from_config(http: Client, config: &ChatConfig) -> Self {
        Self::new(CompletionClient::from_config(http, config), config.max_steps)
            .with_max_duration(Duration::from_secs(config.max_duration_seconds))
    }

    /// Wall-clock ceiling for one chat request, covering every step.
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Open the first completion and return the stream of UI parts.
    ///
    /// Failing to open the completion is returned as an error after the tool
    /// client has been closed. Failures after that point, including running
    /// past the time limit, are reported as an `error` part inside the stream.
    /// An empty history never reaches the provider.
    pub async fn start(
        &self,
        messages: Vec<UiMessage>,
        tools: Option<McpClient>,
    ) -> Result<RelayStream, RelayError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.max_duration)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let history = convert_to_provider_messages(&messages);
        if history.is_empty() {
            debug!("chat history is empty, skipping the provider");
            if let Some(tools) = &tools {
                tools.close();
            }
            return Ok(RelayStream::empty_turn());
        }

        let provider_tools: Vec<ProviderTool> = tools
            .as_ref()
            .map(|client| client.tools().iter().map(ProviderTool::from).collect())
            .unwrap_or_default();

        let opened = timeout_at(
            deadline,
            self.client.stream(history.clone(), provider_tools.clone()),
        )
        .await
        .unwrap_or(Err(RelayError::TimedOut(self.max_duration)));
        let first = match opened {
            Ok(stream) => stream,
            Err(err) => {
                if let Some(tools) = &tools {
                    tools.close();
                }
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(PART_BUFFER);
        let run = RelayRun {
            client: self.client.clone(),
            tools,
            provider_tools,
            history,
            max_steps: self.max_steps,
            tx,
        };
        let task = tokio::spawn(run.drive(first, deadline, self.max_duration));

        Ok(RelayStream { rx, task })
    }
}

/// UI parts in emission order. Dropping it cancels the in-flight completion
/// and releases the tool connection.
pub struct RelayStream {
    rx: mpsc::Receiver<UiStreamPart>,
    task: JoinHandle<()>,
}

impl RelayStream {
    /// A turn that never reaches the provider: start, one empty step, finish.
    fn empty_turn() -> Self {
        let (tx, rx) = mpsc::channel(PART_BUFFER);
        let task = tokio::spawn(async move {
            let parts = [
                UiStreamPart::Start {
                    message_id: format!("msg-{}", cuid2::create_id()),
                },
                UiStreamPart::StartStep,
                UiStreamPart::FinishStep,
                UiStreamPart::Finish,
            ];
            for part in parts {
                if tx.send(part).await.is_err() {
                    break;
                }
            }
        });
        Self { rx, task }
    }
}

impl Stream for RelayStream {
    type Item = UiStreamPart;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum StepError {
    /// The consumer went away.
    Cancelled,
    Failed(String),
}

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    started: bool,
}

struct CompletedCall {
    id: String,
    name: String,
    arguments: String,
    result: String,
}

struct RelayRun {
    client: CompletionClient,
    tools: Option<McpClient>,
    provider_tools: Vec<ProviderTool>,
    history: Vec<ProviderMessage>,
    max_steps: u32,
    tx: mpsc::Sender<UiStreamPart>,
}

impl RelayRun {
    async fn drive(mut self, first: CompletionStream, deadline: Instant, limit: Duration) {
        let outcome = timeout_at(deadline, self.run(first))
            .await
            .unwrap_or_else(|_| Err(StepError::Failed(RelayError::TimedOut(limit).to_string())));
        match outcome {
            Ok(steps) => info!(steps, "chat relay finished"),
            Err(StepError::Cancelled) => debug!("chat relay cancelled by client"),
            Err(StepError::Failed(message)) => {
                error!(error = %message, "chat relay failed mid-stream");
                let _ = self
                    .tx
                    .send(UiStreamPart::Error {
                        error_text: message,
                    })
                    .await;
            }
        }

        if let Some(tools) = self.tools.take() {
            tools.close();
        }
    }

    async fn run(&mut self, first: CompletionStream) -> Result<u32, StepError> {
        self.emit(UiStreamPart::Start {
            message_id: format!("msg-{}", cuid2::create_id()),
        })
        .await?;

        let mut stream = first;
        let mut step = 1;
        loop {
            self.emit(UiStreamPart::StartStep).await?;
            let (text, calls) = self.run_step(stream).await?;
            self.emit(UiStreamPart::FinishStep).await?;

            if calls.is_empty() || step >= self.max_steps {
                break;
            }

            self.record_step(text, calls);
            step += 1;
            debug!(step, "re-prompting with tool results");
            stream = self
                .client
                .stream(self.history.clone(), self.provider_tools.clone())
                .await
                .map_err(|err| StepError::Failed(err.to_string()))?;
        }

        self.emit(UiStreamPart::Finish).await?;
        Ok(step)
    }

    /// Forward one completion; returns its text and the executed tool calls.
    async fn run_step(
        &mut self,
        mut stream: CompletionStream,
    ) -> Result<(String, Vec<CompletedCall>), StepError> {
        let mut text = String::new();
        let mut text_id: Option<String> = None;
        let mut calls: BTreeMap<usize, PendingCall> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            match event.map_err(|err| StepError::Failed(err.to_string()))? {
                ProviderEvent::TextDelta(delta) => {
                    let id = match &text_id {
                        Some(id) => id.clone(),
                        None => {
                            let id = format!("text-{}", cuid2::create_id());
                            self.emit(UiStreamPart::TextStart { id: id.clone() }).await?;
                            text_id = Some(id.clone());
                            id
                        }
                    };
                    text.push_str(&delta);
                    self.emit(UiStreamPart::TextDelta { id, delta }).await?;
                }
                ProviderEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => {
                    let call = calls.entry(index).or_default();
                    if call.id.is_none() {
                        call.id = id;
                    }
                    if call.name.is_none() {
                        call.name = name;
                    }
                    let delta = arguments.unwrap_or_default();
                    call.arguments.push_str(&delta);

                    if !call.started {
                        if let (Some(id), Some(name)) = (call.id.clone(), call.name.clone()) {
                            call.started = true;
                            let buffered = call.arguments.clone();
                            self.emit(UiStreamPart::ToolInputStart {
                                tool_call_id: id.clone(),
                                tool_name: name,
                                dynamic: true,
                            })
                            .await?;
                            if !buffered.is_empty() {
                                self.emit(UiStreamPart::ToolInputDelta {
                                    tool_call_id: id,
                                    input_text_delta: buffered,
                                })
                                .await?;
                            }
                        }
                    } else if !delta.is_empty() {
                        let id = call.id.clone().unwrap_or_default();
                        self.emit(UiStreamPart::ToolInputDelta {
                            tool_call_id: id,
                            input_text_delta: delta,
                        })
                        .await?;
                    }
                }
                ProviderEvent::Finish { reason } => debug!(reason = %reason, "completion finished"),
            }
        }

        if let Some(id) = text_id {
            self.emit(UiStreamPart::TextEnd { id }).await?;
        }

        let mut completed = Vec::with_capacity(calls.len());
        for call in calls.into_values() {
            if let Some(call) = self.execute(call).await? {
                completed.push(call);
            }
        }
        Ok((text, completed))
    }

    async fn execute(&mut self, call: PendingCall) -> Result<Option<CompletedCall>, StepError> {
        let id = call
            .id
            .clone()
            .unwrap_or_else(|| format!("call_{}", cuid2::create_id()));
        let Some(name) = call.name.clone() else {
            warn!(tool_call_id = %id, "provider sent a tool call without a name");
            return Ok(None);
        };

        if !call.started {
            self.emit(UiStreamPart::ToolInputStart {
                tool_call_id: id.clone(),
                tool_name: name.clone(),
                dynamic: true,
            })
            .await?;
        }

        let raw = if call.arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            call.arguments.clone()
        };
        let input = match serde_json::from_str::<Value>(&raw) {
            Ok(input) => input,
            Err(err) => {
                let message = format!("invalid tool arguments: {err}");
                self.emit(UiStreamPart::ToolInputAvailable {
                    tool_call_id: id.clone(),
                    tool_name: name.clone(),
                    input: Value::String(raw.clone()),
                    dynamic: true,
                })
                .await?;
                self.emit(UiStreamPart::ToolOutputError {
                    tool_call_id: id.clone(),
                    error_text: message.clone(),
                    dynamic: true,
                })
                .await?;
                return Ok(Some(CompletedCall {
                    id,
                    name,
                    arguments: raw,
                    result: message,
                }));
            }
        };

        self.emit(UiStreamPart::ToolInputAvailable {
            tool_call_id: id.clone(),
            tool_name: name.clone(),
            input: input.clone(),
            dynamic: true,
        })
        .await?;

        let outcome = match &self.tools {
            Some(tools) => tools.call_tool(&name, input).await,
            None => Err(RelayError::Discovery(format!("tool `{name}` is not available"))),
        };

        let result = match outcome {
            Ok(output) => {
                let result = output.to_string();
                self.emit(UiStreamPart::ToolOutputAvailable {
                    tool_call_id: id.clone(),
                    output,
                    dynamic: true,
                })
                .await?;
                result
            }
            Err(err) => {
                warn!(tool = %name, error = %err, "tool call failed");
                let message = err.to_string();
                self.emit(UiStreamPart::ToolOutputError {
                    tool_call_id: id.clone(),
                    error_text: message.clone(),
                    dynamic: true,
                })
                .await?;
                message
            }
        };

        Ok(Some(CompletedCall {
            id,
            name,
            arguments: raw,
            result,
        }))
    }

    fn record_step(&mut self, text: String, calls: Vec<CompletedCall>) {
        let content = (!text.is_empty()).then_some(text);
        let tool_calls = calls
            .iter()
            .map(|call| ProviderToolCall::function(&call.id, &call.name, &call.arguments))
            .collect();
        self.history
            .push(ProviderMessage::assistant_tool_calls(content, tool_calls));
        self.history.extend(
            calls
                .into_iter()
                .map(|call| ProviderMessage::tool(call.id, call.result)),
        );
    }

    async fn emit(&self, part: UiStreamPart) -> Result<(), StepError> {
        self.tx.send(part).await.map_err(|_| StepError::Cancelled)
    }
}
