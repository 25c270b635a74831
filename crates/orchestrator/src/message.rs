//! Client-held chat history and its conversion to provider messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RelayError, INVALID_MESSAGES_PAYLOAD};
use crate::provider::{ProviderMessage, ProviderToolCall};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: UiRole,
    #[serde(default)]
    pub parts: Vec<UiPart>,
}

impl UiMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: UiRole::User,
            parts: vec![UiPart::text(text)],
        }
    }

    /// Text parts joined in order.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(UiPart::as_text).collect()
    }
}

/// One message part. Only `text` and tool parts are interpreted; every other
/// kind is carried through as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UiPart {
    pub fn text(text: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("text".to_string(), Value::String(text.into()));
        Self {
            kind: "text".to_string(),
            fields,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if self.kind == "text" {
            self.str_field("text")
        } else {
            None
        }
    }

    /// Name of the invoked tool for `tool-<name>` and `dynamic-tool` parts.
    pub fn tool_name(&self) -> Option<&str> {
        if self.kind == "dynamic-tool" {
            return self.str_field("toolName");
        }
        self.kind.strip_prefix("tool-").filter(|name| !name.is_empty())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Read `{ messages }` from a chat request body.
///
/// Bodies that are not JSON objects count as `{}` and a missing `messages`
/// counts as empty. A `messages` value that is not an array, or an entry that
/// is not a message, is rejected.
pub fn parse_chat_request(body: &[u8]) -> Result<Vec<UiMessage>, RelayError> {
    let value = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
    let Some(messages) = value.as_object().and_then(|object| object.get("messages")) else {
        return Ok(Vec::new());
    };

    let Value::Array(items) = messages else {
        return Err(RelayError::InvalidMessages(
            INVALID_MESSAGES_PAYLOAD.to_string(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            UiMessage::deserialize(item).map_err(|err| {
                RelayError::InvalidMessages(format!(
                    "{INVALID_MESSAGES_PAYLOAD}: message {index}: {err}"
                ))
            })
        })
        .collect()
}

/// Convert UI history to the provider's chat-completions messages.
///
/// Assistant tool parts that finished (`output-available` or `output-error`)
/// become a `tool_calls` entry followed by a `tool` message with the output.
/// Parts of any other kind are skipped.
pub fn convert_to_provider_messages(messages: &[UiMessage]) -> Vec<ProviderMessage> {
    let mut converted = Vec::new();

    for message in messages {
        match message.role {
            UiRole::System => {
                let text = message.text();
                if !text.is_empty() {
                    converted.push(ProviderMessage::system(text));
                }
            }
            UiRole::User => {
                let text = message.text();
                if !text.is_empty() {
                    converted.push(ProviderMessage::user(text));
                }
            }
            UiRole::Assistant => convert_assistant(message, &mut converted),
        }
    }

    converted
}

fn convert_assistant(message: &UiMessage, converted: &mut Vec<ProviderMessage>) {
    let text = message.text();
    let mut calls = Vec::new();
    let mut results = Vec::new();

    for part in &message.parts {
        let Some(name) = part.tool_name() else {
            continue;
        };
        let Some(call_id) = part.str_field("toolCallId") else {
            continue;
        };
        let output = match part.str_field("state") {
            Some("output-available") => part
                .fields
                .get("output")
                .map(value_to_text)
                .unwrap_or_default(),
            Some("output-error") => part.str_field("errorText").unwrap_or_default().to_string(),
            _ => continue,
        };

        let arguments = part
            .fields
            .get("input")
            .filter(|input| !input.is_null())
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string());

        calls.push(ProviderToolCall::function(call_id, name, arguments));
        results.push(ProviderMessage::tool(call_id, output));
    }

    if calls.is_empty() {
        if !text.is_empty() {
            converted.push(ProviderMessage::assistant(text));
        }
        return;
    }

    let content = (!text.is_empty()).then_some(text);
    converted.push(ProviderMessage::assistant_tool_calls(content, calls));
    converted.extend(results);
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_json_body_means_no_messages() {
        assert!(parse_chat_request(b"not json").unwrap().is_empty());
        assert!(parse_chat_request(b"").unwrap().is_empty());
        assert!(parse_chat_request(b"[1,2]").unwrap().is_empty());
        assert!(parse_chat_request(b"{}").unwrap().is_empty());
    }

    #[test]
    fn non_array_messages_are_rejected() {
        let err = parse_chat_request(br#"{"messages":"not-an-array"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid messages payload");
        assert!(err.is_client_error());

        assert!(parse_chat_request(br#"{"messages":null}"#).is_err());
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let err = parse_chat_request(br#"{"messages":[{"role":"robot","parts":[]}]}"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid messages payload: message 0"));
    }

    #[test]
    fn parses_text_and_opaque_parts() {
        let messages = parse_chat_request(
            br#"{"messages":[{"id":"m1","role":"user","parts":[{"type":"text","text":"hi"},{"type":"file","url":"x"}]}]}"#,
        )
        .unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "hi");
        assert_eq!(messages[0].parts[1].kind, "file");
        assert_eq!(messages[0].parts[1].str_field("url"), Some("x"));
    }

    #[test]
    fn converts_history_with_tool_results() {
        let messages: Vec<UiMessage> = serde_json::from_value(json!([
            {"role": "system", "parts": [{"type": "text", "text": "Be brief."}]},
            {"role": "user", "parts": [{"type": "text", "text": "Roll a d6"}]},
            {"role": "assistant", "parts": [
                {"type": "step-start"},
                {"type": "dynamic-tool", "toolName": "roll_dice", "toolCallId": "call_1",
                 "state": "output-available", "input": {"sides": 6},
                 "output": {"content": [{"type": "text", "text": "🎲 You rolled a 4!"}]}},
                {"type": "text", "text": "You got 4."}
            ]},
            {"role": "assistant", "parts": [
                {"type": "tool-roll_dice", "toolCallId": "call_2", "state": "input-streaming"}
            ]}
        ]))
        .unwrap();

        let converted = convert_to_provider_messages(&messages);

        assert_eq!(converted.len(), 4);
        assert_eq!(converted[0], ProviderMessage::system("Be brief."));
        assert_eq!(converted[1], ProviderMessage::user("Roll a d6"));
        assert_eq!(converted[2].role, "assistant");
        assert_eq!(converted[2].content.as_deref(), Some("You got 4."));
        assert_eq!(converted[2].tool_calls[0].function.name, "roll_dice");
        assert_eq!(converted[2].tool_calls[0].function.arguments, r#"{"sides":6}"#);
        assert_eq!(converted[3].role, "tool");
        assert_eq!(converted[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(converted[3].content.as_deref().unwrap().contains("You rolled a 4"));
    }

    #[test]
    fn tool_part_names() {
        let part: UiPart = serde_json::from_value(json!({"type": "tool-attendees_list"})).unwrap();
        assert_eq!(part.tool_name(), Some("attendees_list"));
        let part: UiPart = serde_json::from_value(json!({"type": "text", "text": "x"})).unwrap();
        assert_eq!(part.tool_name(), None);
    }
}
