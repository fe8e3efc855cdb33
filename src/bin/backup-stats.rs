//! Collects ZFS backup pool usage on the local host and publishes one
//! backup-host record.

use std::path::PathBuf;

use capacity_planner::{collect::backup, logging, Config, Store};
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "capacityPlanning.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = Config::load(&config_path).await?;
    logging::init(&config.logs)?;

    info!("starting backup capacity collection");
    if let Err(e) = run(&config).await {
        error!("backup capacity collection failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: &Config) -> capacity_planner::Result<()> {
    let store = Store::new(&config.url)?;
    let now = chrono::Utc::now();

    let input = backup::gather().await?;
    let record = backup::host_record(&input, &config.datacenter, now)?;
    store
        .publish(&config.indexes.main, &config.indexes.backup_hosts, &record)
        .await?;

    info!("published backup stats for {}", input.fqdn);
    Ok(())
}
