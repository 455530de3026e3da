//! Convenience re-exports for common `crewline` types.
//!
//! Meant to be glob-imported by programs that run the crew:
//!
//! ```ignore
//! use crewline::prelude::*;
//! ```
//!
//! Lower-level pieces (the runner, pricing seam, archive helpers) stay in
//! their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatCompletion, ChatRequest, Message, ToolDef, json_schema_for};

// ── Agents ──────────────────────────────────────────────────────────
pub use crate::agent::{
    AgentDescriptor, AgentFactory, AgentLimits, AgentsConfig, CompositeEventHandler,
    EventHandler, EventObserver, EventResponse, HarnessEvent, LoggingHandler, NoopHandler,
    RoleConfig,
};

// ── Models and cost ─────────────────────────────────────────────────
pub use crate::api::{
    ChatBackend, ComplexityTier, CostTracker, ModelBinding, ModelRoute, ModelRouter,
    OpenRouterClient, RetryConfig,
};
pub use crate::context::{DEFAULT_PRUNE_BUDGET, PRUNE_SENTINEL, prune_context};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::error::{ConfigError, CrewError};
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport, Stage, StageOutput};
pub use crate::tools::{AiderTool, CodeEditorConfig, Tool, ToolSet};
