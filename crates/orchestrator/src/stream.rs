//! Parts of the UI message stream consumed by the chat page.

use serde::Serialize;
use serde_json::Value;

pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_MESSAGE_STREAM_VERSION: &str = "v1";
/// Final `data:` payload after the last part.
pub const STREAM_TERMINATOR: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamPart {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
        dynamic: bool,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        dynamic: bool,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        dynamic: bool,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        dynamic: bool,
    },
    FinishStep,
    Finish,
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl UiStreamPart {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({ "type": "error", "errorText": err.to_string() }).to_string()
        })
    }
}
