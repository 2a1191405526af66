use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use bakery_sync_lib::{db, logging, ApiClient, Config, SyncService};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    let _guard = logging::init(&config.log_dir());

    info!("Starting bakery-sync v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Sync failed: {e:#}");
            eprintln!("sync failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = db::init(&config.data_dir).context("opening local store")?;
    let config = config
        .with_stored_settings(&store)
        .context("reading stored settings")?;
    info!(api = %config.api_base_url, data_dir = %config.data_dir.display(), "Configuration loaded");

    let client = ApiClient::new(&config).context("building HTTP client")?;
    let service = SyncService::new(Arc::new(store), client);
    let report = service.sync_all().await.context("sync cycle")?;

    println!(
        "pulled: {} new, {} updated | pushed: {} created, {} updated, {} failed",
        report.pulled_inserted,
        report.pulled_updated,
        report.pushed_created,
        report.pushed_updated,
        report.push_failed
    );
    Ok(())
}
