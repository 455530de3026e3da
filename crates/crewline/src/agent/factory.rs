//! Builds role-bound agent descriptors from the role table.

use std::time::Duration;

use crate::api::router::{ModelBinding, ModelRouter};
use crate::context::{DEFAULT_PRUNE_BUDGET, prune_context};
use crate::error::ConfigError;
use crate::tools::aider::AIDER_TOOL_NAME;

use super::config::{AgentsConfig, RoleConfig};

/// Default iteration cap per stage. Large, but finite.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
/// Default wall-clock cap per stage.
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(6 * 60 * 60);

/// Per-agent run limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentLimits {
    pub max_iterations: u32,
    pub max_execution_time: Duration,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME,
        }
    }
}

/// Everything needed to run one agent. Built once per run, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDescriptor {
    /// Role key in the config table (e.g. `architect`).
    pub key: String,
    pub role: String,
    pub goal: String,
    /// Backstory after pruning.
    pub backstory: String,
    pub binding: ModelBinding,
    pub allow_delegation: bool,
    pub limits: AgentLimits,
    /// Names of the tools this agent may call.
    pub tools: Vec<String>,
}

impl AgentDescriptor {
    /// System prompt that sets up the persona.
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}.", self.role);
        if !self.backstory.trim().is_empty() {
            prompt.push(' ');
            prompt.push_str(self.backstory.trim());
        }
        prompt.push_str(&format!("\n\nYour personal goal is: {}", self.goal));
        if !self.tools.is_empty() {
            prompt.push_str(&format!(
                "\n\nYou can use these tools: {}. Call them whenever the task requires \
                 changing files.",
                self.tools.join(", ")
            ));
        }
        prompt
    }
}

/// Turns [`RoleConfig`] entries into [`AgentDescriptor`]s.
#[derive(Debug, Clone)]
pub struct AgentFactory {
    router: ModelRouter,
    limits: AgentLimits,
    backstory_budget: usize,
    /// Role keys that get the code-editing tool.
    tool_roles: Vec<String>,
}

impl Default for AgentFactory {
    fn default() -> Self {
        Self::new(ModelRouter::default())
    }
}

impl AgentFactory {
    pub fn new(router: ModelRouter) -> Self {
        Self {
            router,
            limits: AgentLimits::default(),
            backstory_budget: DEFAULT_PRUNE_BUDGET,
            tool_roles: vec!["developer".into(), "qa_engineer".into()],
        }
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_backstory_budget(mut self, chars: usize) -> Self {
        self.backstory_budget = chars;
        self
    }

    pub fn with_tool_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Build the agent for `key`. Fails without side effects when the key
    /// is absent.
    pub fn build_agent(&self, key: &str, config: &AgentsConfig) -> Result<AgentDescriptor, ConfigError> {
        let entry = config
            .get(key)
            .ok_or_else(|| ConfigError::MissingRole(key.to_string()))?;
        Ok(self.describe(key, entry))
    }

    /// Build every agent in `keys`, in order. Nothing is routed unless all
    /// keys resolve.
    pub fn build_all(&self, keys: &[&str], config: &AgentsConfig) -> Result<Vec<AgentDescriptor>, ConfigError> {
        config.validate(keys)?;
        keys.iter().map(|k| self.build_agent(k, config)).collect()
    }

    fn describe(&self, key: &str, entry: &RoleConfig) -> AgentDescriptor {
        let binding = self.router.select_model_for_label(&entry.complexity);
        let tools = if self.tool_roles.iter().any(|r| r == key) {
            vec![AIDER_TOOL_NAME.to_string()]
        } else {
            Vec::new()
        };
        AgentDescriptor {
            key: key.to_string(),
            role: entry.role.clone(),
            goal: entry.goal.clone(),
            backstory: prune_context(&entry.backstory, self.backstory_budget).into_owned(),
            binding,
            allow_delegation: false,
            limits: self.limits,
            tools,
        }
    }
}
