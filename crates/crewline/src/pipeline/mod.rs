//! The four-stage crew: Specify → Plan → Implement → Verify.
//!
//! [`Pipeline::run`] builds all four agents up front (a configuration error
//! aborts before the first model call), then runs the stages strictly in
//! order. Each stage sees the outputs of the stages it depends on as context.
//! The first failing stage ends the run; artifacts from earlier stages stay on
//! disk.

pub mod archive;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::DEFAULT_MAX_TOKENS;
use crate::agent::config::AgentsConfig;
use crate::agent::events::{Chain, EventHandler, HarnessEvent, NoopHandler};
use crate::agent::factory::AgentFactory;
use crate::agent::runner::StageRunner;
use crate::api::client::ChatBackend;
use crate::api::cost::{CostTotals, CostTracker};
use crate::api::retry::RetryConfig;
use crate::context::{DEFAULT_PRUNE_BUDGET, prune_context};
use crate::error::CrewError;
use crate::tools::aider::{AiderTool, CodeEditorConfig};
use crate::tools::core::ToolSet;

pub use archive::{archive_request, ensure_task_file, sanitize_topic};

// ── Stages ─────────────────────────────────────────────────────────

/// One step of the crew, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Specify,
    Plan,
    Implement,
    Verify,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Specify, Stage::Plan, Stage::Implement, Stage::Verify];

    /// Role key of the agent that runs this stage.
    pub fn role_key(self) -> &'static str {
        match self {
            Stage::Specify => "product_manager",
            Stage::Plan => "architect",
            Stage::Implement => "developer",
            Stage::Verify => "qa_engineer",
        }
    }

    /// Earlier stages whose output this stage reads, in prompt order.
    pub fn context_deps(self) -> &'static [Stage] {
        match self {
            Stage::Specify => &[],
            Stage::Plan => &[Stage::Specify],
            Stage::Implement => &[Stage::Plan, Stage::Specify],
            Stage::Verify => &[Stage::Implement],
        }
    }

    /// File name of the stage's artifact under the specs directory.
    pub fn artifact_name(self) -> Option<&'static str> {
        match self {
            Stage::Specify => Some("feature_spec.md"),
            Stage::Plan => Some("implementation_plan.md"),
            Stage::Implement | Stage::Verify => None,
        }
    }

    pub fn expected_output(self) -> &'static str {
        match self {
            Stage::Specify => "Markdown Feature Spec with Acceptance Criteria.",
            Stage::Plan => "JSON/Markdown File Logic & Schema.",
            Stage::Implement => "Source code execution logs.",
            Stage::Verify => "Test Results Log.",
        }
    }

    /// Task description. Only Specify embeds the request itself.
    pub fn description(self, request: &str) -> String {
        match self {
            Stage::Specify => {
                format!("Analyze Request: '{request}'. Create detailed Feature Spec.")
            }
            Stage::Plan => "Create technical implementation plan based on Feature Spec.".into(),
            Stage::Implement => "Implement code in src/ based on the Plan. You MUST use Aider to \
                                 edit files. You MUST modify App.tsx to include the new features. \
                                 Do not stop until the code is fully implemented and compiled."
                .into(),
            Stage::Verify => "Write and run Vitest tests. Fix if failed.".into(),
        }
    }

    /// Full user prompt: description, expected output and prior-stage context.
    pub fn prompt(self, request: &str, context: &[&str]) -> String {
        let mut prompt = format!(
            "{}\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.",
            self.description(request),
            self.expected_output()
        );
        if !context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(&context.join("\n\n"));
        }
        prompt
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Specify => "Specify",
            Stage::Plan => "Plan",
            Stage::Implement => "Implement",
            Stage::Verify => "Verify",
        })
    }
}

// ── Config and report ──────────────────────────────────────────────

/// Where the crew works and how much text it sends.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project directory the crew works in.
    pub workdir: PathBuf,
    /// Artifact directory, relative to `workdir` unless absolute.
    pub specs_dir: PathBuf,
    /// Character budget for the task description.
    pub prune_budget: usize,
    pub code_editor: CodeEditorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            specs_dir: PathBuf::from("docs/specs"),
            prune_budget: DEFAULT_PRUNE_BUDGET,
            code_editor: CodeEditorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn specs_path(&self) -> PathBuf {
        self.workdir.join(&self.specs_dir)
    }
}

/// Output of one stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub stage: Stage,
    pub text: String,
    /// Where the output was written, for stages with an artifact.
    pub artifact: Option<PathBuf>,
    pub rounds: u32,
    /// Spend attributed to this stage, when a cost tracker is attached.
    pub cost_usd: Option<f64>,
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub stages: Vec<StageOutput>,
    /// Session totals, when a cost tracker is attached.
    pub cost: Option<CostTotals>,
}

impl PipelineReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageOutput> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// The last stage's answer (the QA log).
    pub fn final_output(&self) -> &str {
        self.stages.last().map_or("", |s| s.text.as_str())
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Runs the four stages over a chat backend.
///
/// ```ignore
/// let cost = CostTracker::new();
/// let report = Pipeline::new(&client, PipelineConfig::default())
///     .with_event_handler(&LoggingHandler)
///     .with_cost_tracker(&cost)
///     .run(&agents, &task)
///     .await?;
/// ```
pub struct Pipeline<'a> {
    backend: &'a dyn ChatBackend,
    config: PipelineConfig,
    factory: AgentFactory,
    tools: ToolSet,
    handler: &'a dyn EventHandler,
    cost: Option<&'a CostTracker>,
    max_tokens: u32,
    retry_backoff: RetryConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: &'a dyn ChatBackend, config: PipelineConfig) -> Self {
        let tools = ToolSet::new().with(AiderTool::new(config.code_editor.clone()));
        Self {
            backend,
            config,
            factory: AgentFactory::default(),
            tools,
            handler: &NoopHandler,
            cost: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry_backoff: RetryConfig::default(),
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Attach the session cost tracker. It observes every completion.
    pub fn with_cost_tracker(mut self, cost: &'a CostTracker) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_agent_factory(mut self, factory: AgentFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Replace the tool set (the default holds the aider tool).
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Backoff timing between completion retries.
    pub fn with_retry_backoff(mut self, retry: RetryConfig) -> Self {
        self.retry_backoff = retry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `task`.
    pub async fn run(&self, agents: &AgentsConfig, task: &str) -> Result<PipelineReport, CrewError> {
        let roles = Stage::ALL.map(Stage::role_key);
        let descriptors = self.factory.build_all(&roles, agents)?;

        let specs_dir = self.config.specs_path();
        std::fs::create_dir_all(&specs_dir).map_err(|source| CrewError::Artifact {
            path: specs_dir.clone(),
            source,
        })?;

        let request = prune_context(task, self.config.prune_budget);
        let chain = Chain(self.handler, self.cost.map(|c| c as &dyn EventHandler));
        info!("[Crew] Launching workflow ({} stages)", Stage::ALL.len());

        let mut outputs: Vec<StageOutput> = Vec::with_capacity(Stage::ALL.len());
        for (stage, agent) in Stage::ALL.into_iter().zip(&descriptors) {
            chain.on_event(&HarnessEvent::StageStart {
                stage,
                agent: &agent.key,
            });

            let prompt = {
                let context: Vec<&str> = stage
                    .context_deps()
                    .iter()
                    .filter_map(|dep| outputs.iter().find(|o| o.stage == *dep))
                    .map(|o| o.text.as_str())
                    .collect();
                stage.prompt(&request, &context)
            };

            let runner = StageRunner::new(self.backend, &self.tools, &chain)
                .with_max_tokens(self.max_tokens)
                .with_retry_backoff(self.retry_backoff.clone());

            let spent_before = self.cost.map(CostTracker::total);
            let run = runner
                .run(agent, &prompt)
                .await
                .map_err(|message| CrewError::Stage { stage, message })?;
            // Later stages build on this output, so an empty answer stops the run.
            if run.output.trim().is_empty() {
                return Err(CrewError::Stage {
                    stage,
                    message: format!("agent '{}' returned an empty answer", agent.key),
                });
            }
            if !run.finished {
                warn!("[{stage}] using last answer after hitting the iteration limit");
            }

            let artifact = match stage.artifact_name() {
                Some(name) => Some(write_artifact(&specs_dir.join(name), &run.output)?),
                None => None,
            };

            chain.on_event(&HarnessEvent::StageFinished {
                stage,
                output_chars: run.output.chars().count(),
            });
            outputs.push(StageOutput {
                stage,
                text: run.output,
                artifact,
                rounds: run.rounds,
                cost_usd: self
                    .cost
                    .zip(spent_before)
                    .map(|(c, before)| c.total() - before),
            });
        }

        Ok(PipelineReport {
            stages: outputs,
            cost: self.cost.map(CostTracker::totals),
        })
    }
}

fn write_artifact(path: &Path, text: &str) -> Result<PathBuf, CrewError> {
    std::fs::write(path, text).map_err(|source| CrewError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}
