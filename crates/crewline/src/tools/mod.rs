//! Tools the agents can call.
//!
//! - [`core`]: [`Tool`] trait and [`ToolSet`], which handles dispatch,
//!   argument validation, truncation and timeouts.
//! - [`aider`]: [`AiderTool`], code editing through an external `aider`
//!   process with a wall-clock limit.

pub mod aider;
pub mod core;

pub use aider::{AIDER_TOOL_NAME, AiderTool, CodeEditError, CodeEditOutput, CodeEditor, CodeEditorConfig};
pub use self::core::{Tool, ToolFailure, ToolFuture, ToolSet, parse_tool_args};
