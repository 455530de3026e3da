//! Per-stage tool-use loop.
//!
//! [`StageRunner`] sends the agent's messages and tool definitions to the
//! model, executes any returned tool calls through the [`ToolSet`], appends
//! the results and repeats until the model answers with text only or the
//! agent's iteration limit is reached. The whole run is bounded by the
//! agent's wall-clock limit. Hitting the iteration limit without any text
//! answer is an error.
//!
//! ```ignore
//! let runner = StageRunner::new(&client, &tools, &LoggingHandler);
//! let run = runner.run(&agent, "Create technical implementation plan.").await?;
//! println!("{}", run.output);
//! ```

use tracing::{debug, warn};

use crate::api::client::ChatBackend;
use crate::api::retry::{RetryConfig, retry_api_call};
use crate::tools::core::ToolSet;
use crate::{ChatRequest, DEFAULT_MAX_TOKENS, Message, UsageRequest};

use super::events::{EventHandler, EventResponse, HarnessEvent};
use super::factory::AgentDescriptor;

/// Result of one agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The agent's final answer (the last non-empty text it produced).
    pub output: String,
    /// Rounds (completion calls) used.
    pub rounds: u32,
    /// `false` when the iteration limit ended the run.
    pub finished: bool,
    /// Full transcript, including the initial system and user messages.
    pub messages: Vec<Message>,
}

/// Runs one agent to completion.
///
/// Borrows the backend, tools and handler; bind them before building the
/// runner so they outlive [`run`](Self::run).
pub struct StageRunner<'a> {
    backend: &'a dyn ChatBackend,
    tools: &'a ToolSet,
    handler: &'a dyn EventHandler,
    max_tokens: u32,
    retry: RetryConfig,
}

impl<'a> StageRunner<'a> {
    pub fn new(backend: &'a dyn ChatBackend, tools: &'a ToolSet, handler: &'a dyn EventHandler) -> Self {
        Self {
            backend,
            tools,
            handler,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Backoff timing for completion retries. The retry count always comes
    /// from the agent's model binding.
    pub fn with_retry_backoff(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run `agent` on `prompt`. Errors carry the failure text; the pipeline
    /// attaches the stage.
    pub async fn run(&self, agent: &AgentDescriptor, prompt: &str) -> Result<AgentRun, String> {
        let limit = agent.limits.max_execution_time;
        match tokio::time::timeout(limit, self.run_rounds(agent, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "agent '{}' exceeded its {}s execution limit",
                agent.key,
                limit.as_secs()
            )),
        }
    }

    async fn run_rounds(&self, agent: &AgentDescriptor, prompt: &str) -> Result<AgentRun, String> {
        let mut messages = vec![Message::system(agent.system_prompt()), Message::user(prompt)];
        let tool_defs = self.tools.definitions_for(&agent.tools);
        let tools = (!tool_defs.is_empty()).then_some(tool_defs);
        let retry = RetryConfig {
            max_retries: agent.binding.max_retries,
            ..self.retry.clone()
        };

        let mut output = String::new();
        let max_iterations = agent.limits.max_iterations;

        for round in 1..=max_iterations {
            let body = ChatRequest {
                model: agent.binding.model.clone(),
                messages: messages.clone(),
                max_tokens: self.max_tokens,
                temperature: agent.binding.temperature,
                tools: tools.clone(),
                usage: Some(UsageRequest { include: true }),
            };
            debug!(
                "[{}] round {round}/{max_iterations}: {} message(s)",
                agent.key,
                body.messages.len()
            );

            let completion = retry_api_call(&retry, || self.backend.chat(&body)).await?;

            let mut injected = Vec::new();
            self.emit(
                &HarnessEvent::Completion {
                    agent: &agent.key,
                    model: &agent.binding.model,
                    round,
                    completion: &completion,
                },
                &mut injected,
            );

            if let Some(text) = completion.content.as_deref().filter(|t| !t.trim().is_empty()) {
                self.emit(&HarnessEvent::Text(text), &mut injected);
                output = text.to_string();
            }

            if completion.tool_calls.is_empty() {
                if let Some(text) = completion.content.clone() {
                    messages.push(Message::assistant_text(text));
                }
                self.emit(&HarnessEvent::Finished { rounds: round }, &mut injected);
                return Ok(AgentRun {
                    output,
                    rounds: round,
                    finished: true,
                    messages,
                });
            }

            messages.push(Message::assistant_tool_calls(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));

            for call in &completion.tool_calls {
                let name = call.function.name.as_str();
                let arguments = call.function.arguments.as_str();
                self.emit(&HarnessEvent::ToolExecuting { name, arguments }, &mut injected);

                let result = if agent.tools.iter().any(|t| t == name) {
                    self.tools
                        .execute(name, arguments)
                        .await
                        .map_err(|e| e.to_string())?
                } else {
                    format!("Error: tool '{name}' is not available to this agent")
                };

                self.emit(
                    &HarnessEvent::ToolResult {
                        name,
                        call_id: &call.id,
                        result: &result,
                    },
                    &mut injected,
                );
                messages.push(Message::tool_result(&call.id, result));
            }

            messages.extend(injected.into_iter().map(Message::user));
        }

        warn!(
            "[{}] stopped after {max_iterations} iteration(s) without a final answer",
            agent.key
        );
        self.handler
            .on_event(&HarnessEvent::IterationLimitReached { max_iterations });
        if output.trim().is_empty() {
            return Err(format!(
                "agent '{}' produced no answer within {max_iterations} iteration(s)",
                agent.key
            ));
        }
        Ok(AgentRun {
            output,
            rounds: max_iterations,
            finished: false,
            messages,
        })
    }

    fn emit(&self, event: &HarnessEvent<'_>, injected: &mut Vec<String>) {
        if let Some(EventResponse::InjectMessage(msg)) = self.handler.on_event(event) {
            injected.push(msg);
        }
    }
}
