//! Events and handlers for agent runs.
//!
//! The [`runner`](super::runner) reports everything it does through
//! [`HarnessEvent`] variants: stage boundaries, every completion received,
//! tool calls and their results. Callers implement [`EventHandler`] to
//! observe them for logging, cost tracking or anything else.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`EventObserver`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | [`CostTracker`](crate::api::cost::CostTracker) | Session spend |

use tracing::{debug, info, warn};

use crate::ChatCompletion;
use crate::pipeline::Stage;

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted while a pipeline stage runs.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// A stage is starting with the given agent.
    StageStart { stage: Stage, agent: &'a str },
    /// A completion came back from the model.
    Completion {
        agent: &'a str,
        model: &'a str,
        round: u32,
        completion: &'a ChatCompletion,
    },
    /// The model returned text (may be alongside tool calls).
    Text(&'a str),
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// The agent finished (no more tool calls).
    Finished { rounds: u32 },
    /// The agent hit its iteration limit without finishing.
    IterationLimitReached { max_iterations: u32 },
    /// A stage produced its output.
    StageFinished { stage: Stage, output_chars: usize },
}

/// Response from an event handler.
///
/// Every current event is informational. `InjectMessage` lets a handler add a
/// user message before the next round of the running agent.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    InjectMessage(String),
}

/// Handler for agent run events.
///
/// The default implementation ignores everything.
///
/// ```ignore
/// struct PrintText;
///
/// impl EventHandler for PrintText {
///     fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
///         if let HarnessEvent::Text(text) = event {
///             println!("{text}");
///         }
///         None
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        let _ = event;
        None
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Adapts an observation-only closure into an [`EventHandler`].
///
/// ```ignore
/// let handler = EventObserver::new(|event| {
///     if let HarnessEvent::Text(t) = event { println!("{t}"); }
/// });
/// ```
pub struct EventObserver<F>(F)
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync;

impl<F> EventObserver<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for EventObserver<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        (self.0)(event);
        None
    }
}

/// Delegates to multiple inner handlers.
///
/// Events are dispatched to all handlers in registration order. The first
/// non-`None` response wins, but every handler still sees the event.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(my_handler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler without breaking the builder chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        let mut first = None;
        for handler in &self.handlers {
            let response = handler.on_event(event);
            if first.is_none() {
                first = response;
            }
        }
        first
    }
}

/// Two borrowed handlers chained, used internally to put the cost tracker
/// next to the caller's handler without boxing either.
pub(crate) struct Chain<'h>(pub &'h dyn EventHandler, pub Option<&'h dyn EventHandler>);

impl EventHandler for Chain<'_> {
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        let first = self.0.on_event(event);
        let second = self.1.and_then(|h| h.on_event(event));
        first.or(second)
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        match event {
            HarnessEvent::StageStart { stage, agent } => {
                info!("[{stage}] starting with agent '{agent}'");
            }
            HarnessEvent::Completion {
                agent,
                model,
                round,
                completion,
            } => {
                let (p, c) = completion.usage.as_ref().map_or((0, 0), |u| {
                    (
                        u.prompt_tokens.unwrap_or(0),
                        u.completion_tokens.unwrap_or(0),
                    )
                });
                debug!("[{agent}] round {round} via {model}: {p} prompt + {c} completion tokens");
            }
            HarnessEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            HarnessEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            HarnessEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            HarnessEvent::Finished { rounds } => {
                debug!("Agent finished after {rounds} round(s)");
            }
            HarnessEvent::IterationLimitReached { max_iterations } => {
                warn!("Agent hit iteration limit ({max_iterations})");
            }
            HarnessEvent::StageFinished {
                stage,
                output_chars,
            } => {
                info!("[{stage}] finished ({output_chars} chars)");
            }
        }
        None
    }
}
