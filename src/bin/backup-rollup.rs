//! Rolls the published backup host records up to datacenter level: sums of
//! per-host 24 hour means plus the recomputed volume ratio.

use std::path::PathBuf;

use capacity_planner::{aggregate, logging, Config, Filter, Record, Store};
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "capacityPlanning.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from);
    let config = Config::load(&config_path).await?;
    logging::init(&config.logs)?;

    info!("starting backup datacenter rollup");
    if let Err(e) = run(&config).await {
        error!("backup datacenter rollup failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: &Config) -> capacity_planner::Result<()> {
    let store = Store::new(&config.url)?;
    let now = chrono::Utc::now();
    let index = &config.indexes.main;
    let backup_hosts = &config.indexes.backup_hosts;

    let datacenters =
        aggregate::distinct_values(&store, index, backup_hosts, Filter::new(), "datacenter")
            .await?;
    if datacenters.is_empty() {
        info!("no backup host records in the last 24 hours, nothing to roll up");
        return Ok(());
    }

    for datacenter in datacenters {
        let hosts = aggregate::distinct_values(
            &store,
            index,
            backup_hosts,
            Filter::new().term("datacenter", datacenter.as_str()),
            "name",
        )
        .await?;

        let mut record = Record::new(&datacenter, now);
        for field in aggregate::BACKUP_ROLLUP_FIELDS {
            let value =
                aggregate::sum_child_means(&store, index, backup_hosts, &hosts, field).await?;
            record.set(field, value);
        }
        aggregate::finish_backup_datacenter(&mut record);

        store
            .publish(index, &config.indexes.backup_dc, &record)
            .await?;
        info!(
            "published datacenter rollup for {} ({} hosts)",
            datacenter,
            hosts.len()
        );
    }
    Ok(())
}
