//! Roster Tools Crate
//!
//! The fixed set of callable operations offered to model-context clients:
//! dice rolls and attendee list/insert/update. Arguments are checked against
//! each tool's declared constraints before anything touches the store.

pub mod content;
pub mod descriptor;
pub mod error;
pub mod nickname;
pub mod registry;
pub mod validation;

pub use content::{ContentBlock, ToolOutput};
pub use descriptor::ToolDescriptor;
pub use error::{ToolError, ToolResult};
pub use nickname::{slugify, synthesize_nickname, synthesize_nickname_with};
pub use registry::{roll_dice_with, ToolRegistry};
