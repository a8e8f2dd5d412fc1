//! Juleha entry point.
//!
//! One binary, five subcommands: the gateway server, the queue worker,
//! a single scheduler pass, and the two admin store passes (merge and
//! tier refresh). All configuration comes from the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use juleha_config::{
    GatewayConfig, SchedulerConfig, StoreConfig, ToolsConfig, UpstreamConfig, WorkerConfig,
};
use juleha_gateway::AppState;
use juleha_store::LinkStore;
use juleha_tools::ToolsClient;
use juleha_worker::{run_scheduler, run_worker};

#[derive(Parser)]
#[command(name = "juleha", about = "Guarded AI-chat gateway for the AICengHub catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat gateway server.
    Serve,
    /// Run the enrichment queue worker until interrupted.
    Worker,
    /// Run one stale-refresh scheduler pass and exit.
    Schedule,
    /// Promote pending candidate links into the catalog.
    Merge,
    /// Re-canonicalize pricing tiers and tags across the catalog.
    RefreshTiers,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn open_store() -> Result<LinkStore> {
    let config = StoreConfig::from_env();
    let location = config
        .database_url
        .context("NEON_DATABASE_URL or DATABASE_URL must be set for this command")?;
    LinkStore::open(&location)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let state = AppState::new(
                GatewayConfig::from_env(),
                UpstreamConfig::from_env(),
                ToolsConfig::from_env(),
                StoreConfig::from_env(),
            )?;
            juleha_gateway::serve(state).await?;
        }
        Command::Worker => {
            let store = open_store()?;
            let tools = ToolsClient::new(&ToolsConfig::from_env());
            run_worker(&store, &tools, &WorkerConfig::from_env()).await?;
        }
        Command::Schedule => {
            let store = open_store()?;
            let inserted = run_scheduler(&store, &SchedulerConfig::from_env())?;
            tracing::info!(inserted, "scheduler pass finished");
        }
        Command::Merge => {
            let mut store = open_store()?;
            let outcome = store.merge_pending_candidates()?;
            tracing::info!(
                slot = outcome.backup_slot,
                merged = outcome.merged,
                rejected = outcome.rejected,
                created = outcome.created,
                "merge finished"
            );
        }
        Command::RefreshTiers => {
            let store = open_store()?;
            let updated = store.refresh_main_pricing_tiers()?;
            tracing::info!(updated, "tier refresh finished");
        }
    }
    Ok(())
}
