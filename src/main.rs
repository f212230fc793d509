use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use indie_scout::config::RunConfig;
use indie_scout::generator::ModelsClient;
use indie_scout::http::RetryClient;
use indie_scout::logging;
use indie_scout::orchestrator::Orchestrator;
use indie_scout::prompts;
use indie_scout::state::StateStore;
use indie_scout::steam::SteamClient;
use indie_scout::steamspy::SteamSpyClient;
use indie_scout::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "scout", version, about = "Steam indie game discovery & article pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run one discovery/enrichment pass (the default)
    Run,
    /// Print a summary of the persisted ingestion state
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    logging::init_tracing("info")?;

    let cli = Cli::parse();
    let cfg = RunConfig::from_env();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(&cfg).await,
        Commands::State => show_state(&cfg),
    }
}

async fn run_pipeline(cfg: &RunConfig) -> Result<()> {
    info!("indie game discovery starting");

    let http = RetryClient::new(cfg.max_http_attempts, cfg.backoff_base);
    let steam = SteamClient::new(http.clone());
    let steamspy = SteamSpyClient::new(http);
    let enricher = ModelsClient::from_env().context("enrichment client setup failed")?;
    let prompts = prompts::load_prompts(&cfg.prompts_dir).context("prompt setup failed")?;
    let state_store = StateStore::new(cfg.state_file.clone(), cfg.max_processed_ids);

    let orchestrator = Orchestrator::new(cfg, &steam, &steamspy, &enricher, &prompts, &state_store);
    match orchestrator.run().await {
        Ok(summary) => {
            info!(
                processed = summary.processed,
                skipped = summary.skipped,
                failed = summary.failed,
                "done"
            );
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "run aborted");
            Err(err.into())
        }
    }
}

fn show_state(cfg: &RunConfig) -> Result<()> {
    let state_store = StateStore::new(cfg.state_file.clone(), cfg.max_processed_ids);
    let state = state_store.load()?;

    println!(
        "last run:   {}",
        if state.last_run_at.is_empty() {
            "(never)"
        } else {
            &state.last_run_at
        }
    );
    println!("processed:  {} ids", state.processed_app_ids.len());
    println!("failing:    {} ids", state.failed_app_ids.len());
    for (app_id, entry) in &state.failed_app_ids {
        println!("  app {app_id}: {} failure(s)", entry.fail_count);
    }
    Ok(())
}
