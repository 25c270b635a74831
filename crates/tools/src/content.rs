//! Result envelope returned by tool calls.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// One entry of a tool result's `content` list.
///
/// Structured blocks go over the wire as text holding the JSON document so
/// that clients which only read text still see the data.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Json(Value),
}

impl ContentBlock {
    pub fn as_text(&self) -> String {
        match self {
            ContentBlock::Text(text) => text.clone(),
            ContentBlock::Json(value) => value.to_string(),
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "text")?;
        map.serialize_entry("text", &self.as_text())?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(text.into())],
            structured_content: None,
            is_error: false,
        }
    }

    /// A JSON block plus the same data as structured content.
    ///
    /// Non-object payloads are wrapped under `key` since structured content
    /// must be an object.
    pub fn json(key: &str, value: Value) -> Self {
        let structured = match &value {
            Value::Object(_) => value.clone(),
            other => {
                let mut wrapper = serde_json::Map::new();
                wrapper.insert(key.to_string(), other.clone());
                Value::Object(wrapper)
            }
        };
        Self {
            content: vec![ContentBlock::Json(value)],
            structured_content: Some(structured),
            is_error: false,
        }
    }

    /// Concatenated text of every block.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_output_uses_wire_shape() {
        let output = ToolOutput::text("hello");
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"content": [{"type": "text", "text": "hello"}], "isError": false})
        );
    }

    #[test]
    fn json_output_wraps_arrays_in_structured_content() {
        let output = ToolOutput::json("attendees", json!([{"id": 1}]));
        let wire = serde_json::to_value(&output).unwrap();

        assert_eq!(wire["content"][0]["type"], "text");
        assert_eq!(wire["content"][0]["text"], r#"[{"id":1}]"#);
        assert_eq!(wire["structuredContent"], json!({"attendees": [{"id": 1}]}));
    }

    #[test]
    fn json_output_keeps_objects_as_structured_content() {
        let output = ToolOutput::json("attendee", json!({"id": 3}));
        assert_eq!(output.structured_content, Some(json!({"id": 3})));
    }
}
