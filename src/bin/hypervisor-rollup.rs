//! Rolls the published hypervisor host records up to cluster level: sums
//! of per-host 24 hour means, overcommit-adjusted ratios, and remaining-VM
//! counts per configured profile.

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

    info!("starting hypervisor cluster rollup");
    if let Err(e) = run(&config).await {
        error!("hypervisor cluster rollup failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(config: &Config) -> capacity_planner::Result<()> {
    let store = Store::new(&config.url)?;
    let now = chrono::Utc::now();
    let index = &config.indexes.main;
    let hv = &config.indexes.hv;

    let clusters = aggregate::distinct_values(&store, index, hv, Filter::new(), "cluster").await?;
    if clusters.is_empty() {
        info!("no hypervisor records in the last 24 hours, nothing to roll up");
        return Ok(());
    }

    for cluster in clusters {
        let hosts = aggregate::distinct_values(
            &store,
            index,
            hv,
            Filter::new().term("cluster", cluster.as_str()),
            "name",
        )
        .await?;

        let mut record = Record::new(&cluster, now);
        record.set("datacenter", config.datacenter.as_str());
        for field in aggregate::HV_ROLLUP_FIELDS {
            let value = aggregate::sum_child_means(&store, index, hv, &hosts, field).await?;
            record.set(field, value);
        }
        aggregate::finish_hypervisor_cluster(&mut record, config);

        store
            .publish(index, &config.indexes.clusters, &record)
            .await?;
        info!(
            "published cluster rollup for {} ({} hosts)",
            cluster,
            hosts.len()
        );
    }
    Ok(())
}
