use std::time::Duration;

use thiserror::Error;

/// Body text returned for a chat request whose `messages` is not an array.
pub const INVALID_MESSAGES_PAYLOAD: &str = "Invalid messages payload";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidMessages(String),
    #[error("provider http request failed: {0}")]
    ProviderHttp(#[from] reqwest::Error),
    #[error("provider returned {status}: {message}")]
    ProviderStatus { status: u16, message: String },
    #[error("provider stream failed: {0}")]
    ProviderStream(String),
    #[error("tool discovery failed: {0}")]
    Discovery(String),
    #[error("tool server error {code}: {message}")]
    Protocol { code: i64, message: String },
    #[error("chat request exceeded the {0:?} time limit")]
    TimedOut(Duration),
}

impl RelayError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, RelayError::InvalidMessages(_))
    }
}
