mod config;
mod domain;
mod http;
mod jsonl;
mod logger;
mod output;
mod pipeline;
mod portfolio;
mod prices;
mod reports;
mod strategy;
mod tasks;
mod time;
mod wallet;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::http::ReqwestTransport;
use crate::pipeline::Pipeline;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load local .env if present (no-op under cron)
    let _ = dotenvy::dotenv();

    logger::init_tracing();

    // Failures are logged, never surfaced as an exit code: outputs are a
    // refreshable cache and the next scheduled run retries.
    if let Err(err) = run().await {
        error!("update failed: {err:?}");
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cfg = config::Config::from_env()?;
    info!(?cfg, "boot");

    let transport = Arc::new(ReqwestTransport::new(cfg.http_timeout_secs)?);
    let summary = Pipeline::new(cfg, transport)?.run().await?;
    info!(?summary, "pipeline.done");
    Ok(())
}
