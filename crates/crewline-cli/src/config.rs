//! Command-line configuration.
//!
//! [`CliConfig`] holds the parsed flags and converts them into crewline
//! types: the [`ModelRouter`], [`AgentLimits`], [`PipelineConfig`] and
//! [`CodeEditorConfig`]. Relative paths resolve against `--workdir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use crewline::OPENROUTER_URL;
use crewline::agent::factory::{AgentFactory, AgentLimits};
use crewline::api::router::{ComplexityTier, DEFAULT_HIGH_MODEL, DEFAULT_LOW_MODEL, ModelRouter};
use crewline::context::DEFAULT_PRUNE_BUDGET;
use crewline::pipeline::PipelineConfig;
use crewline::tools::aider::CodeEditorConfig;

/// Run the four-stage agent crew on the request in a task file.
#[derive(Parser, Debug, Clone)]
#[command(name = "crewline", version)]
pub struct CliConfig {
    /// File holding the request. Created with a sample request if missing.
    #[arg(long, default_value = "TZ.txt")]
    pub task_file: PathBuf,

    /// YAML role table.
    #[arg(long, default_value = ".agent/configs/agents.yaml")]
    pub config: PathBuf,

    /// Project directory the crew works in.
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Where the spec and plan are written.
    #[arg(long, default_value = "docs/specs")]
    pub specs_dir: PathBuf,

    /// Where processed requests are archived.
    #[arg(long, default_value = "tasks/archive")]
    pub archive_dir: PathBuf,

    /// Leave the task file in place after the run.
    #[arg(long)]
    pub no_archive: bool,

    /// Model for high-complexity roles.
    #[arg(long, default_value = DEFAULT_HIGH_MODEL)]
    pub high_model: String,

    /// Model for every other role.
    #[arg(long, default_value = DEFAULT_LOW_MODEL)]
    pub low_model: String,

    /// Retries per completion call for transient failures.
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Tool-use rounds per stage (at least 1).
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_iterations: u32,

    /// Wall-clock limit per stage, in seconds.
    #[arg(long, default_value_t = 6 * 60 * 60)]
    pub max_stage_secs: u64,

    /// Character budget for the request and role backstories.
    #[arg(long, default_value_t = DEFAULT_PRUNE_BUDGET)]
    pub prune_budget: usize,

    /// Time limit for one aider run, in seconds.
    #[arg(long, default_value_t = 600)]
    pub aider_timeout_secs: u64,

    /// aider executable.
    #[arg(long, default_value = "aider")]
    pub aider_bin: String,

    /// Chat completions endpoint (any OpenAI-compatible URL).
    #[arg(long, default_value = OPENROUTER_URL)]
    pub api_url: String,

    /// Log filter, e.g. `debug` or `crewline=trace`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliConfig {
    /// `path` as given if absolute, otherwise under the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    pub fn router(&self) -> ModelRouter {
        ModelRouter::default()
            .with_model(ComplexityTier::High, &self.high_model)
            .with_model(ComplexityTier::Low, &self.low_model)
            .with_max_retries(self.max_retries)
    }

    pub fn limits(&self) -> AgentLimits {
        AgentLimits {
            max_iterations: self.max_iterations,
            max_execution_time: Duration::from_secs(self.max_stage_secs),
        }
    }

    pub fn agent_factory(&self) -> AgentFactory {
        AgentFactory::new(self.router())
            .with_limits(self.limits())
            .with_backstory_budget(self.prune_budget)
    }

    pub fn code_editor(&self) -> CodeEditorConfig {
        CodeEditorConfig {
            program: self.aider_bin.clone(),
            workdir: self.workdir.clone(),
            timeout: Duration::from_secs(self.aider_timeout_secs),
            ..Default::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workdir: self.workdir.clone(),
            specs_dir: self.specs_dir.clone(),
            prune_budget: self.prune_budget,
            code_editor: self.code_editor(),
        }
    }

    /// Filter directive for the log subscriber: `--log-level`, then
    /// `RUST_LOG`, then `info`.
    pub fn log_filter(&self, env: Option<String>) -> String {
        self.log_level
            .clone()
            .or(env.filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| "info".to_string())
    }
}
