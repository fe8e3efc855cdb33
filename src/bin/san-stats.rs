//! Fetches SNMP stats from every configured SAN group and publishes pool,
//! host, cluster and datacenter records.

use std::path::PathBuf;

use capacity_planner::{collect::san, logging, Config, Store};
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "capacityPlanning.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = Config::load(&config_path).await?;
    logging::init(&config.logs)?;

    info!("starting SAN capacity collection");
    if let Err(e) = run(&config).await {
        error!("SAN capacity collection failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: &Config) -> capacity_planner::Result<()> {
    let store = Store::new(&config.url)?;
    let now = chrono::Utc::now();

    san::run(config, &store, now).await
}
