//! Chat relay building blocks.
//!
//! A chat request flows through [`parse_chat_request`], optional tool
//! discovery with [`McpClient`] at the address chosen by
//! [`normalize_discovery_url`], and finally [`ChatRelay::start`], whose
//! [`RelayStream`] yields the UI message stream parts.

pub mod discovery;
pub mod error;
pub mod mcp;
pub mod message;
pub mod provider;
pub mod relay;
pub mod sse;
pub mod stream;

pub use discovery::normalize_discovery_url;
pub use error::{RelayError, INVALID_MESSAGES_PAYLOAD};
pub use mcp::{McpClient, McpTool};
pub use message::{convert_to_provider_messages, parse_chat_request, UiMessage, UiPart, UiRole};
pub use provider::{CompletionClient, ProviderEvent, ProviderMessage};
pub use relay::{ChatRelay, RelayStream};
pub use stream::{UiStreamPart, STREAM_TERMINATOR, UI_MESSAGE_STREAM_HEADER, UI_MESSAGE_STREAM_VERSION};
