//! Error types for tool execution

use roster_database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl ToolError {
    pub fn invalid(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
