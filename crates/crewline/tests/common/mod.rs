//! Shared helpers for the pipeline integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crewline::api::client::{ChatBackend, ChatFuture};
use crewline::prelude::*;

/// A [`ChatBackend`] that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ChatCompletion, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, completion: ChatCompletion) -> Self {
        self.push(Ok(completion))
    }

    pub fn fail(self, error: impl Into<String>) -> Self {
        self.push(Err(error.into()))
    }

    fn push(self, reply: Result<ChatCompletion, String>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// User prompt of every request, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.messages.get(1).map(|m| m.text().to_string()).unwrap_or_default())
            .collect()
    }
}

impl ChatBackend for ScriptedBackend {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        self.requests.lock().unwrap().push(body.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("OpenRouter API HTTP 400: no scripted reply".into()));
        Box::pin(async move { reply })
    }
}

pub const AGENTS_YAML: &str = r#"
product_manager:
  role: Product Manager
  goal: Turn requests into feature specs
  backstory: Writes crisp acceptance criteria.
  complexity: low
architect:
  role: Software Architect
  goal: Plan the implementation
  backstory: Designs React frontends.
  complexity: high
developer:
  role: Senior Developer
  goal: Implement the plan
  backstory: Ships working code.
  complexity: low
qa_engineer:
  role: QA Engineer
  goal: Verify the implementation
  backstory: Loves Vitest.
  complexity: low
"#;

pub fn agents() -> AgentsConfig {
    AgentsConfig::from_yaml_str(AGENTS_YAML).unwrap()
}

/// Pipeline config rooted in `workdir` with fast limits.
pub fn config(workdir: &Path) -> PipelineConfig {
    PipelineConfig {
        workdir: workdir.to_path_buf(),
        code_editor: CodeEditorConfig {
            workdir: workdir.to_path_buf(),
            timeout: Duration::from_secs(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        ..Default::default()
    }
}

/// A text completion carrying a provider-reported cost.
pub fn answer(text: &str, cost: f64) -> ChatCompletion {
    ChatCompletion::text(text)
        .with_usage(100, 50)
        .with_reported_cost(cost)
}
