//! Tool abstraction for function-calling agents.
//!
//! A [`Tool`] exposes a JSON Schema definition to the model and an async
//! `execute` method. Tools are collected into a [`ToolSet`], which handles
//! dispatch, argument validation, timeouts and result truncation. Each agent
//! only sees the tools its descriptor grants.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ToolDef;

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Why a tool call could not produce a result for the model.
///
/// Recoverable problems (bad arguments, a command exiting non-zero) are
/// returned as `Ok` text so the model can correct itself. A `ToolFailure`
/// ends the stage.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolFailure {
    #[error("tool '{name}' timed out after {}s", .after.as_secs())]
    Timeout { name: String, after: Duration },
    #[error("tool '{name}' is unavailable: {reason}")]
    Unavailable { name: String, reason: String },
}

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolFailure>> + Send + 'a>>;

/// A tool that an agent can invoke via function-calling.
pub trait Tool: Send + Sync {
    /// The tool definition sent to the LLM API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the raw JSON arguments string.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools dispatched by name.
pub struct ToolSet {
    tools: BTreeMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Upper bound on any single tool call. `None` leaves bounding to the tool.
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            default_timeout: None,
        }
    }

    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of the named tools, in the order given. Unknown names are
    /// skipped.
    pub fn definitions_for(&self, names: &[String]) -> Vec<ToolDef> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name.
    ///
    /// Unknown tools and invalid arguments come back as `Ok("Error: ...")`
    /// so the model can retry with a different call.
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String, ToolFailure> {
        let Some(tool) = self.tools.get(name) else {
            return Ok(format!("Error: unknown tool '{name}'"));
        };

        if let Some(error) = validate_tool_arguments(tool.as_ref(), arguments) {
            return Ok(error);
        }

        log_tool_call(name, arguments);
        let start = Instant::now();

        let result = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    warn!("Tool {name} timed out after {:.0}s", limit.as_secs_f64());
                    Err(ToolFailure::Timeout {
                        name: name.to_string(),
                        after: limit,
                    })
                }
            },
            None => tool.execute(arguments).await,
        }?;

        debug!(
            "Tool {name} completed in {:.0}ms ({} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            result.len()
        );
        Ok(truncate_result(result, self.max_result_bytes))
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Cut `s` to at most `max` bytes (on a char boundary) with a size note.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..cut).unwrap_or_default(),
        s.len()
    )
}

/// Parse raw JSON arguments into a typed struct, or an error string for the model.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

/// Validate arguments against the tool's JSON Schema.
///
/// Returns `None` when valid, or an error string the model can act on.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{}': {e}",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    // A broken schema is the tool's problem, not the model's.
    let validator = jsonschema::validator_for(&schema).ok()?;

    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}\nPlease fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO with a short argument preview.
fn log_tool_call(name: &str, arguments: &str) {
    let preview: String = arguments.chars().take(120).collect();
    let ellipsis = if arguments.chars().count() > 120 { "..." } else { "" };
    info!("[tool] {name}({preview}{ellipsis})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    struct Echo;

    impl Tool for Echo {
        fn definition(&self) -> ToolDef {
            ToolDef::new("echo", "Echo text back", crate::json_schema_for::<EchoArgs>())
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let arguments = arguments.to_string();
            Box::pin(async move {
                let args: EchoArgs = match parse_tool_args(&arguments) {
                    Ok(a) => a,
                    Err(e) => return Ok(e),
                };
                Ok(args.text)
            })
        }
    }

    struct Stall;

    impl Tool for Stall {
        fn definition(&self) -> ToolDef {
            ToolDef::new("stall", "Never finishes", serde_json::json!({"type": "object"}))
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            })
        }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let tools = ToolSet::new().with(Echo);
        assert_eq!(tools.execute("echo", r#"{"text":"hi"}"#).await, Ok("hi".into()));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let tools = ToolSet::new();
        let out = tools.execute("nope", "{}").await.unwrap();
        assert!(out.contains("unknown tool"));
    }

    #[tokio::test]
    async fn schema_violation_is_reported_to_model() {
        let tools = ToolSet::new().with(Echo);
        let out = tools.execute("echo", r#"{"other": 1}"#).await.unwrap();
        assert!(out.starts_with("Error: argument validation failed"));
        let out = tools.execute("echo", "not json").await.unwrap();
        assert!(out.contains("invalid JSON"));
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let tools = ToolSet::new()
            .with(Stall)
            .with_default_timeout(Some(Duration::from_millis(20)));
        let err = tools.execute("stall", "{}").await.unwrap_err();
        assert!(matches!(err, ToolFailure::Timeout { .. }));
    }

    #[tokio::test]
    async fn long_results_are_truncated() {
        let tools = ToolSet::new().with(Echo).with_max_result_bytes(4);
        let out = tools.execute("echo", r#"{"text":"abcdefgh"}"#).await.unwrap();
        assert_eq!(out, "abcd...\n[truncated: 8 bytes total]");
    }

    #[test]
    fn definitions_follow_requested_names() {
        let tools = ToolSet::new().with(Echo).with(Stall);
        let defs = tools.definitions_for(&["stall".into(), "missing".into(), "echo".into()]);
        let names: Vec<&str> = defs.iter().map(|d| d.function.name.as_str()).collect();
        assert_eq!(names, ["stall", "echo"]);
        assert!(tools.definitions_for(&[]).is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        let out = truncate_result(s, 5);
        assert!(out.starts_with("éé..."));
        assert!(out.contains("[truncated: 20 bytes total]"));
        assert_eq!(truncate_result("short".into(), 100), "short");
    }
}
