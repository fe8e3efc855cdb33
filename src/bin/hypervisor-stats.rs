//! Collects hypervisor host and per-VM allocation stats and publishes one
//! record per VM plus the host record.

use std::path::PathBuf;

use capacity_planner::{collect::hypervisor, logging, Config, Store};
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "capacityPlanning.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = Config::load(&config_path).await?;
    logging::init(&config.logs)?;

    info!("starting hypervisor capacity collection");
    if let Err(e) = run(&config).await {
        error!("hypervisor capacity collection failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: &Config) -> capacity_planner::Result<()> {
    let store = Store::new(&config.url)?;
    let now = chrono::Utc::now();

    let input = hypervisor::gather(config).await?;
    for vm in &input.vms {
        let record = hypervisor::vm_record(&input.fqdn, &config.cluster, vm, now);
        store
            .publish(&config.indexes.main, &config.indexes.vm, &record)
            .await?;
    }

    let record = hypervisor::host_record(&input, config, now)?;
    store
        .publish(&config.indexes.main, &config.indexes.hv, &record)
        .await?;

    info!(
        "published {} VM records and host stats for {}",
        input.vms.len(),
        input.fqdn
    );
    Ok(())
}
