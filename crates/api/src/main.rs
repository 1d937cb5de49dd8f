//! Threshold Monitor - Main Entry Point

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging(settings.log.json)?;

    info!("=== Threshold Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting sensor threshold monitoring...");

    run_server(settings).await
}
