//! Cost-aware multi-agent pipeline that turns a free-text task description
//! into a feature spec, an implementation plan, code and tests.
//!
//! `crewline` runs four role-bound agents in a fixed order (product manager,
//! architect, developer, QA) on top of the [OpenRouter](https://openrouter.ai/)
//! chat completions API. Each agent is built from a YAML role table, bound to
//! a model chosen by its complexity tier, and run through a small tool-use loop.
//! The developer and QA agents can edit files through an external `aider`
//! process.
//!
//! # Getting started
//!
//! ```ignore
//! use crewline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CrewError> {
//!     let agents = AgentsConfig::load(".agent/configs/agents.yaml")?;
//!     let client = OpenRouterClient::new(std::env::var("OPENROUTER_KEY").unwrap_or_default())
//!         .map_err(CrewError::Client)?;
//!
//!     let cost = CostTracker::new();
//!     let handler = CompositeEventHandler::new().with(LoggingHandler);
//!
//!     let report = Pipeline::new(&client, PipelineConfig::default())
//!         .with_event_handler(&handler)
//!         .with_cost_tracker(&cost)
//!         .run(&agents, "Add a contact form with validation")
//!         .await?;
//!
//!     println!("{}", report.final_output());
//!     eprintln!("{}", cost.final_report());
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Bounding prompt size:** [`context::prune_context`] keeps the head and
//!   tail of oversized text and elides the middle.
//! - **Choosing a model per role:** [`api::router::ModelRouter`] maps a
//!   [`ComplexityTier`](api::router::ComplexityTier) to a
//!   [`ModelBinding`](api::router::ModelBinding) through a policy table.
//! - **Tracking spend:** [`api::cost::CostTracker`] observes every completion
//!   through the [`EventHandler`](agent::events::EventHandler) seam and keeps
//!   the session total.
//! - **Building agents:** [`agent::factory::AgentFactory`] turns a role entry
//!   from [`AgentsConfig`](agent::config::AgentsConfig) into an
//!   [`AgentDescriptor`](agent::factory::AgentDescriptor).
//! - **Running the crew:** [`pipeline::Pipeline`] sequences the four
//!   [`Stage`](pipeline::Stage)s and wires prior outputs in as context.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Role config, agent factory, per-stage runner, events |
//! | [`api`] | OpenRouter client, retry, model router, pricing and cost tracking |
//! | [`context`] | Head/tail pruning of oversized text |
//! | [`pipeline`] | Four-stage orchestrator, stage artifacts, request archive |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet), aider code-editing tool |

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod prelude;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use error::{ConfigError, CrewError};

// Re-export schemars for tool argument types in downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Maximum tokens requested per completion.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

// ── Schema generation ──────────────────────────────────────────────

/// Generate the JSON Schema for a tool argument type.
///
/// ```
/// use crewline::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct EditArgs {
///     instruction: String,
///     files: String,
/// }
///
/// let schema = json_schema_for::<EditArgs>();
/// assert_eq!(schema["type"], "object");
/// assert_eq!(schema["required"].as_array().unwrap().len(), 2);
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    /// Ask the provider to report the billed cost in `usage.cost`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageRequest>,
}

/// Usage accounting options for a request.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct UsageRequest {
    pub include: bool,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested tool calls. Any text the model produced
    /// alongside the calls is kept.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }

    /// Text content, or `""` for tool-call-only turns.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCallData,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Parsed result of one chat completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    /// Model that actually served the request, when the provider reports it.
    pub model: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A text-only completion. Mostly useful for test doubles.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".into()),
            ..Default::default()
        }
    }

    /// Attach token usage (builder pattern).
    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.usage = Some(UsageInfo {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens + completion_tokens),
            cost: None,
        });
        self
    }

    /// Attach a provider-reported cost in USD (builder pattern).
    pub fn with_reported_cost(mut self, cost: f64) -> Self {
        let usage = self.usage.get_or_insert_with(UsageInfo::default);
        usage.cost = Some(cost);
        self
    }
}

/// Token usage statistics, plus the billed cost when the provider reports it.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    #[serde(default)]
    pub cost: Option<f64>,
}
