//! Model-context protocol pieces shared by the relay's discovery client and
//! the tool endpoint.

pub mod client;
pub mod protocol;

pub use client::McpClient;
pub use protocol::{JsonRpcError, JsonRpcMessage, McpTool};
