//! Argument decoding and constraint checks.

use serde_json::{Map, Value};

use crate::error::{ToolError, ToolResult};

/// Field-by-field view over a tool call's arguments.
pub struct Arguments<'a> {
    tool: &'a str,
    fields: Map<String, Value>,
}

impl<'a> Arguments<'a> {
    /// `null` counts as an empty argument object; anything else must be an object.
    pub fn parse(tool: &'a str, raw: &Value) -> ToolResult<Self> {
        let fields = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ToolError::invalid(
                    tool,
                    format!("arguments must be an object, got {}", json_type(other)),
                ))
            }
        };
        Ok(Self { tool, fields })
    }

    /// Reject properties the tool does not declare.
    pub fn deny_unknown(&self, allowed: &[&str]) -> ToolResult<()> {
        match self.fields.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(ToolError::invalid(
                self.tool,
                format!("unexpected property `{key}`"),
            )),
            None => Ok(()),
        }
    }

    pub fn required_integer(&self, key: &str) -> ToolResult<i64> {
        match self.present(key) {
            Some(value) => self.integer(key, value),
            None => Err(self.missing(key)),
        }
    }

    pub fn required_string(&self, key: &str) -> ToolResult<&str> {
        match self.present(key) {
            Some(value) => self.string(key, value),
            None => Err(self.missing(key)),
        }
    }

    pub fn optional_string(&self, key: &str) -> ToolResult<Option<&str>> {
        self.present(key)
            .map(|value| self.string(key, value))
            .transpose()
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    fn integer(&self, key: &str, value: &Value) -> ToolResult<i64> {
        if let Some(number) = value.as_i64() {
            return Ok(number);
        }
        match value.as_f64() {
            Some(number) if number.fract() == 0.0 && number.abs() < i64::MAX as f64 => {
                Ok(number as i64)
            }
            _ => Err(ToolError::invalid(
                self.tool,
                format!("`{key}` must be an integer, got {}", describe(value)),
            )),
        }
    }

    fn string<'v>(&self, key: &str, value: &'v Value) -> ToolResult<&'v str> {
        value.as_str().ok_or_else(|| {
            ToolError::invalid(
                self.tool,
                format!("`{key}` must be a string, got {}", json_type(value)),
            )
        })
    }

    fn missing(&self, key: &str) -> ToolError {
        ToolError::invalid(self.tool, format!("`{key}` is required"))
    }
}

/// Constraint checks shared by the tools.
pub struct Validator;

impl Validator {
    pub fn minimum(tool: &str, key: &str, value: i64, minimum: i64) -> ToolResult<()> {
        if value < minimum {
            return Err(ToolError::invalid(
                tool,
                format!("`{key}` must be greater than or equal to {minimum}, got {value}"),
            ));
        }
        Ok(())
    }

    /// Non-blank text no longer than `max_length` characters.
    pub fn name(tool: &str, key: &str, value: &str, max_length: usize) -> ToolResult<()> {
        if value.trim().is_empty() {
            return Err(ToolError::invalid(tool, format!("`{key}` cannot be empty")));
        }
        if value.chars().count() > max_length {
            return Err(ToolError::invalid(
                tool,
                format!("`{key}` too long (max {max_length} characters)"),
            ));
        }
        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(number) => number.to_string(),
        other => json_type(other).to_string(),
    }
}
