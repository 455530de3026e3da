//! Command-line runner for the crewline agent pipeline.
//!
//! Reads the request from a task file, runs the product manager, architect,
//! developer and QA agents over it, reports the session cost and archives the
//! request. Reads the API key from `OPENROUTER_KEY` (a `.env` file works).
//!
//! ```sh
//! echo "Add a contact form with validation" > TZ.txt
//! crewline --workdir ./my-app
//! ```

mod config;

use chrono::Local;
use clap::Parser;
use crewline::agent::config::PIPELINE_ROLES;
use crewline::pipeline::{archive_request, ensure_task_file};
use crewline::prelude::*;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::CliConfig;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = CliConfig::parse();

    let filter = cli.log_filter(std::env::var("RUST_LOG").ok());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cost = CostTracker::new();
    let outcome = run(&cli, &cost).await;
    // Printed directly so `--log-level warn` still shows it.
    eprintln!("{}", cost.final_report());

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &CliConfig, cost: &CostTracker) -> Result<(), CrewError> {
    let task_file = cli.resolve(&cli.task_file);
    let request = ensure_task_file(&task_file)?;

    let agents = AgentsConfig::load(cli.resolve(&cli.config))?;
    agents.validate(&PIPELINE_ROLES)?;

    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| CrewError::Client("OPENROUTER_KEY environment variable is not set".into()))?;
    let client = OpenRouterClient::new(api_key)
        .map_err(CrewError::Client)?
        .with_base_url(&cli.api_url);

    info!("[Crew] Request from {}", task_file.display());
    let report = Pipeline::new(&client, cli.pipeline_config())
        .with_agent_factory(cli.agent_factory())
        .with_event_handler(&LoggingHandler)
        .with_cost_tracker(cost)
        .run(&agents, &request)
        .await?;

    println!("{}", report.final_output());

    if !cli.no_archive {
        archive_request(&task_file, &cli.resolve(&cli.archive_dir), &request, Local::now())?;
    }
    Ok(())
}
