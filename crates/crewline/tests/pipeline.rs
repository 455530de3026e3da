//! End-to-end pipeline runs against a scripted chat backend.

mod common;

use common::{ScriptedBackend, agents, answer, config, fast_retry};
use crewline::prelude::*;
use crewline::tools::AIDER_TOOL_NAME;
use crewline::{MessageRole, ToolCall};

fn four_answers() -> ScriptedBackend {
    ScriptedBackend::new()
        .reply(answer("SPEC: contact form", 0.001))
        .reply(answer("PLAN: ContactForm.tsx", 0.01))
        .reply(answer("DEV: implemented", 0.002))
        .reply(answer("QA: 4 tests passed", 0.003))
}

#[tokio::test]
async fn stages_run_in_order_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();

    let report = Pipeline::new(&backend, config(dir.path()))
        .run(&agents(), "Add a contact form")
        .await
        .unwrap();

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ALL);
    assert_eq!(report.final_output(), "QA: 4 tests passed");

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[0].starts_with("Analyze Request: 'Add a contact form'."));
    assert!(prompts[1].contains("SPEC: contact form"));

    // Implement sees the plan first, then the spec.
    let plan_at = prompts[2].find("PLAN: ContactForm.tsx").unwrap();
    let spec_at = prompts[2].find("SPEC: contact form").unwrap();
    assert!(plan_at < spec_at);

    assert!(prompts[3].contains("DEV: implemented"));
    assert!(!prompts[3].contains("PLAN:"));
}

#[tokio::test]
async fn agents_are_bound_low_high_low_low() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();

    Pipeline::new(&backend, config(dir.path()))
        .run(&agents(), "Add a contact form")
        .await
        .unwrap();

    let requests = backend.requests();
    let models: Vec<&str> = requests.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(
        models,
        ["openai/gpt-4o-mini", "openai/gpt-4o", "openai/gpt-4o-mini", "openai/gpt-4o-mini"]
    );
    assert!((requests[1].temperature - 0.1).abs() < f32::EPSILON);
    assert!((requests[0].temperature - 0.3).abs() < f32::EPSILON);

    // Only the developer and QA agents see the code-editing tool.
    let with_tools: Vec<bool> = requests.iter().map(|r| r.tools.is_some()).collect();
    assert_eq!(with_tools, [false, false, true, true]);
    let dev_tools = requests[2].tools.as_ref().unwrap();
    assert_eq!(dev_tools[0].function.name, AIDER_TOOL_NAME);
}

#[tokio::test]
async fn long_task_is_pruned_before_the_model_sees_it() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let task: String = (0..50_000u32)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();

    Pipeline::new(&backend, config(dir.path()))
        .run(&agents(), &task)
        .await
        .unwrap();

    let prompt = &backend.prompts()[0];
    let excerpt = prompt
        .strip_prefix("Analyze Request: '")
        .and_then(|rest| rest.split("'. Create detailed Feature Spec.").next())
        .unwrap();
    assert_eq!(
        excerpt.chars().count(),
        DEFAULT_PRUNE_BUDGET + PRUNE_SENTINEL.chars().count()
    );
    assert!(excerpt.contains(PRUNE_SENTINEL));
    assert!(!prompt.contains(&task));
}

#[tokio::test]
async fn prune_budget_is_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let config = PipelineConfig {
        prune_budget: 10,
        ..config(dir.path())
    };

    Pipeline::new(&backend, config)
        .run(&agents(), "0123456789ABCDEF")
        .await
        .unwrap();

    let expected = format!("Analyze Request: '01234{PRUNE_SENTINEL}BCDEF'.");
    assert!(backend.prompts()[0].starts_with(&expected));
}

#[tokio::test]
async fn artifacts_are_written_for_spec_and_plan() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();

    let report = Pipeline::new(&backend, config(dir.path()))
        .run(&agents(), "Add a contact form")
        .await
        .unwrap();

    let specs = dir.path().join("docs/specs");
    assert_eq!(
        std::fs::read_to_string(specs.join("feature_spec.md")).unwrap(),
        "SPEC: contact form"
    );
    assert_eq!(
        std::fs::read_to_string(specs.join("implementation_plan.md")).unwrap(),
        "PLAN: ContactForm.tsx"
    );
    assert_eq!(
        report.stage(Stage::Plan).unwrap().artifact.as_deref(),
        Some(specs.join("implementation_plan.md").as_path())
    );
    assert!(report.stage(Stage::Verify).unwrap().artifact.is_none());
}

#[tokio::test]
async fn missing_role_aborts_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let partial = AgentsConfig::from_yaml_str(
        "product_manager:\n  role: PM\n  goal: specs\narchitect:\n  role: A\n  goal: plans\n",
    )
    .unwrap();

    let err = Pipeline::new(&backend, config(dir.path()))
        .run(&partial, "Add a contact form")
        .await
        .unwrap_err();

    assert!(matches!(err, CrewError::Config(ConfigError::MissingRole(ref k)) if k == "developer"));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn failing_stage_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new()
        .reply(answer("SPEC: contact form", 0.001))
        .fail("OpenRouter API HTTP 401: bad key");

    let err = Pipeline::new(&backend, config(dir.path()))
        .with_retry_backoff(fast_retry())
        .run(&agents(), "Add a contact form")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Plan));
    assert!(err.to_string().starts_with("Plan stage failed:"));
    // No retries for a permanent error, and no later stages.
    assert_eq!(backend.requests().len(), 2);
    // The spec written before the failure stays on disk.
    assert!(dir.path().join("docs/specs/feature_spec.md").exists());
    assert!(!dir.path().join("docs/specs/implementation_plan.md").exists());
}

#[tokio::test]
async fn zero_iteration_limit_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let factory = AgentFactory::default().with_limits(AgentLimits {
        max_iterations: 0,
        ..AgentLimits::default()
    });

    let err = Pipeline::new(&backend, config(dir.path()))
        .with_agent_factory(factory)
        .run(&agents(), "Add a contact form")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Specify));
    assert!(backend.requests().is_empty());
    assert!(!dir.path().join("docs/specs/feature_spec.md").exists());
}

#[tokio::test]
async fn stage_without_an_answer_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // The product manager keeps calling a tool it was never granted.
    let stuck = ChatCompletion {
        tool_calls: vec![ToolCall::new(
            "call_1",
            AIDER_TOOL_NAME,
            r#"{"instruction": "x", "files": "a.txt"}"#,
        )],
        ..Default::default()
    };
    let backend = ScriptedBackend::new()
        .reply(stuck.clone())
        .reply(stuck)
        .reply(answer("PLAN", 0.0));
    let factory = AgentFactory::default().with_limits(AgentLimits {
        max_iterations: 2,
        ..AgentLimits::default()
    });

    let err = Pipeline::new(&backend, config(dir.path()))
        .with_agent_factory(factory)
        .run(&agents(), "Add a contact form")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Specify));
    assert!(err.to_string().contains("no answer"));
    assert_eq!(backend.requests().len(), 2);
    assert!(!dir.path().join("docs/specs/feature_spec.md").exists());
}

#[tokio::test]
async fn empty_answer_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new()
        .reply(answer("SPEC", 0.0))
        .reply(answer("  ", 0.0))
        .reply(answer("DEV", 0.0));

    let err = Pipeline::new(&backend, config(dir.path()))
        .run(&agents(), "task")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Plan));
    assert!(err.to_string().contains("empty answer"));
    assert_eq!(backend.requests().len(), 2);
    assert!(!dir.path().join("docs/specs/implementation_plan.md").exists());
}

#[tokio::test]
async fn transient_failures_are_retried_per_binding() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new()
        .fail("OpenRouter API HTTP 503: overloaded")
        .fail("OpenRouter API HTTP 502: bad gateway")
        .reply(answer("SPEC", 0.0))
        .reply(answer("PLAN", 0.0))
        .reply(answer("DEV", 0.0))
        .reply(answer("QA", 0.0));

    let report = Pipeline::new(&backend, config(dir.path()))
        .with_retry_backoff(fast_retry())
        .run(&agents(), "task")
        .await
        .unwrap();

    assert_eq!(report.final_output(), "QA");
    assert_eq!(backend.requests().len(), 6);
}

#[tokio::test]
async fn cost_tracker_sums_every_completion() {
    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let cost = CostTracker::new();

    let report = Pipeline::new(&backend, config(dir.path()))
        .with_cost_tracker(&cost)
        .run(&agents(), "Add a contact form")
        .await
        .unwrap();

    let expected = 0.001 + 0.01 + 0.002 + 0.003;
    assert!((cost.total() - expected).abs() < 1e-12);
    assert_eq!(cost.totals().priced_calls, 4);

    let plan_cost = report.stage(Stage::Plan).unwrap().cost_usd.unwrap();
    assert!((plan_cost - 0.01).abs() < 1e-12);
    assert_eq!(report.cost.unwrap().priced_calls, 4);
}

#[tokio::test]
async fn unpriceable_completions_never_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    // Plain text completions carry no usage at all.
    let backend = ScriptedBackend::new()
        .reply(ChatCompletion::text("SPEC"))
        .reply(answer("PLAN", 0.02))
        .reply(ChatCompletion::text("DEV"))
        .reply(ChatCompletion::text("QA"));
    let cost = CostTracker::new();

    Pipeline::new(&backend, config(dir.path()))
        .with_cost_tracker(&cost)
        .run(&agents(), "task")
        .await
        .unwrap();

    assert!((cost.total() - 0.02).abs() < 1e-12);
    assert_eq!(cost.totals().unpriced_calls, 3);
}

#[tokio::test]
async fn runs_do_not_share_session_cost() {
    let first_dir = tempfile::tempdir().unwrap();
    let second_dir = tempfile::tempdir().unwrap();
    let first = CostTracker::new();
    let second = CostTracker::new();

    Pipeline::new(&four_answers(), config(first_dir.path()))
        .with_cost_tracker(&first)
        .run(&agents(), "one")
        .await
        .unwrap();
    Pipeline::new(&four_answers(), config(second_dir.path()))
        .with_cost_tracker(&second)
        .run(&agents(), "two")
        .await
        .unwrap();

    assert!((first.total() - second.total()).abs() < 1e-12);
    assert!((first.total() - 0.016).abs() < 1e-12);
}

#[tokio::test]
async fn handler_sees_stage_boundaries() {
    use std::sync::{Arc, Mutex};

    let dir = tempfile::tempdir().unwrap();
    let backend = four_answers();
    let started = Arc::new(Mutex::new(Vec::new()));
    let sink = started.clone();
    let handler = EventObserver::new(move |event| {
        if let HarnessEvent::StageStart { stage, agent } = event {
            sink.lock().unwrap().push(format!("{stage}:{agent}"));
        }
    });

    Pipeline::new(&backend, config(dir.path()))
        .with_event_handler(&handler)
        .run(&agents(), "task")
        .await
        .unwrap();

    assert_eq!(
        *started.lock().unwrap(),
        [
            "Specify:product_manager",
            "Plan:architect",
            "Implement:developer",
            "Verify:qa_engineer"
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn developer_edits_through_the_code_editor() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.code_editor.program = "sh".into();
    config.code_editor.leading_args = vec!["-c".into(), "echo applied edit".into()];

    let edit = ChatCompletion {
        tool_calls: vec![ToolCall::new(
            "call_1",
            AIDER_TOOL_NAME,
            r#"{"instruction": "Create the form", "files": "src/App.tsx src/ContactForm.tsx"}"#,
        )],
        ..Default::default()
    };
    let backend = ScriptedBackend::new()
        .reply(answer("SPEC", 0.0))
        .reply(answer("PLAN", 0.0))
        .reply(edit)
        .reply(answer("DEV: done", 0.0))
        .reply(answer("QA", 0.0));

    let report = Pipeline::new(&backend, config)
        .run(&agents(), "task")
        .await
        .unwrap();

    assert_eq!(report.stage(Stage::Implement).unwrap().rounds, 2);
    let requests = backend.requests();
    let tool_reply = requests[3]
        .messages
        .iter()
        .find(|m| m.role == MessageRole::Tool)
        .unwrap();
    assert!(tool_reply.text().starts_with("Aider successfully executed. Output:\n"));
    assert!(tool_reply.text().contains("applied edit"));
}

#[cfg(unix)]
#[tokio::test]
async fn editor_timeout_fails_the_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.code_editor.program = "sh".into();
    config.code_editor.leading_args = vec!["-c".into(), "sleep 5".into()];
    config.code_editor.timeout = std::time::Duration::from_millis(100);

    let edit = ChatCompletion {
        tool_calls: vec![ToolCall::new(
            "call_1",
            AIDER_TOOL_NAME,
            r#"{"instruction": "Create the form", "files": "src/App.tsx"}"#,
        )],
        ..Default::default()
    };
    let backend = ScriptedBackend::new()
        .reply(answer("SPEC", 0.0))
        .reply(answer("PLAN", 0.0))
        .reply(edit);

    let err = Pipeline::new(&backend, config)
        .run(&agents(), "task")
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Implement));
    assert!(err.to_string().contains("timed out"));
    assert_eq!(backend.requests().len(), 3);
}
