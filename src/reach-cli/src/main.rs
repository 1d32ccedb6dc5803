//! Reach targeting engine CLI — replay a campaign payload and a fired event
//! against a clean engine and print the evaluation report.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use reach_campaigns::{AlwaysReady, CampaignEngine};
use reach_core::{SdkConfig, SystemClock};
use reach_storage::{MemoryStorage, StorageManager};

#[derive(Parser, Debug)]
#[command(name = "reach-cli")]
#[command(about = "Evaluate a campaign payload against a fired event")]
#[command(version)]
struct Cli {
    /// Path to a campaign resource response JSON file
    #[arg(long)]
    payload: String,

    /// Event name to fire
    #[arg(long)]
    event: String,

    /// Event payload as inline JSON, e.g. '{"artist":"prince"}'
    #[arg(long)]
    event_payload: Option<String>,

    /// User id for the simulated session
    #[arg(long, default_value = "cli-user")]
    user: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reach=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = SdkConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SdkConfig::default()
    });
    config.qa.enabled = true;

    let storage = StorageManager::new(Arc::new(MemoryStorage::new()));
    let mut engine = CampaignEngine::new(
        &cli.user,
        &config,
        storage,
        Arc::new(AlwaysReady),
        Arc::new(SystemClock),
    );

    let raw = std::fs::read_to_string(&cli.payload)
        .with_context(|| format!("reading payload file {}", cli.payload))?;
    let assets = engine
        .store_campaigns_json(&raw)
        .context("ingesting campaign payload")?;
    info!(
        campaigns = engine.campaigns().len(),
        assets = assets.len(),
        "payload loaded"
    );

    let event_payload = cli
        .event_payload
        .as_deref()
        .map(|raw| {
            serde_json::from_str::<serde_json::Value>(raw)
                .context("parsing --event-payload")
                .and_then(|value| {
                    value
                        .as_object()
                        .cloned()
                        .context("--event-payload must be a JSON object")
                })
        })
        .transpose()?;

    let outcome = engine.check_triggers(&cli.event, event_payload.as_ref(), None);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
