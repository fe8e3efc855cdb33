//!
//! SAN collector: per-pool SNMP stats and the in-run rollup that publishes
//! pool, host, cluster and datacenter records. Each level is published
//! before the next one up is computed from it.
//!

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::snmp::{self, SanAgent};
use crate::{aggregate, units, Record, Result, Store};

/// Share of the total volume withheld from the reported host-level free
/// space.
pub const SAFETY_MARGIN_PCT: f64 = 5.0;

/// Usage tag for pools that hold volumes.
pub const USAGE_STORAGE: &str = "storage";
/// Usage tag for pools that only receive replicas.
pub const USAGE_REPLICATION: &str = "replication";

/// Raw per-pool column values, GiB except the volume count.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub volume_count: f64,
    pub volume_total: f64,
    pub volume_free: f64,
    pub replication_total: f64,
    pub replication_used: f64,
    pub replication_free: f64,
    pub snapshot_reserved: f64,
    pub snapshot_used: f64,
    pub delegated_total: f64,
    pub delegated_used: f64,
    pub volume_allocated: f64,
    pub thin_provision_free: f64,
    pub snapshot_free: f64,
}

/// Build the record for one pool. A pool without volumes is dedicated to
/// replication and is tagged so the host rollup can leave it out.
pub fn pool_record(
    name: &str,
    host: &str,
    cluster: &str,
    datacenter: &str,
    stats: &PoolStats,
    now: DateTime<Utc>,
) -> Record {
    let used = stats.volume_total - stats.volume_free;
    let ratio = if stats.volume_total > 0.0 {
        used / stats.volume_total * 100.0
    } else {
        0.0
    };
    let usage = if stats.volume_count > 0.0 {
        USAGE_STORAGE
    } else {
        USAGE_REPLICATION
    };

    Record::new(name, now)
        .with("host", host)
        .with("cluster", cluster)
        .with("datacenter", datacenter)
        .with("SANCountVol", stats.volume_count)
        .with("SANTotalVol", stats.volume_total)
        .with("SANFreeVol", stats.volume_free)
        .with("SANTotalReplication", stats.replication_total)
        .with("SANUsedReplication", stats.replication_used)
        .with("SANFreeReplication", stats.replication_free)
        .with("SANReservedSnapshot", stats.snapshot_reserved)
        .with("SANUsedSnapshot", stats.snapshot_used)
        .with("SANTotalDelegatedSpace", stats.delegated_total)
        .with("SANUsedDelegatedSpace", stats.delegated_used)
        .with("SANAllocatedVolSpace", stats.volume_allocated)
        .with("SANFreeThinProv", stats.thin_provision_free)
        .with("SANFreeSnapshot", stats.snapshot_free)
        .with("SANUsedVol", used)
        .with("SANVolRatio", ratio)
        .with("SANPoolsUsage", usage)
}

/// Pools dedicated to replication hold no volumes of their own.
#[must_use]
pub fn is_replication_pool(record: &Record) -> bool {
    record.text("SANPoolsUsage") == Some(USAGE_REPLICATION)
}

/// Host rollup: replication-only pools are left out, the volume ratio is
/// recomputed, and the safety margin comes off the free volume. A host
/// whose pools are all replication targets reports zeroed totals rather
/// than disappearing from the parent sum.
pub fn host_rollup(
    pools: &[Record],
    host: &str,
    cluster: &str,
    datacenter: &str,
    now: DateTime<Utc>,
) -> Record {
    let counted: Vec<Record> = pools
        .iter()
        .filter(|pool| !is_replication_pool(pool))
        .cloned()
        .collect();

    let mut record = aggregate::sum_records(&counted, host, now);
    record.set("cluster", cluster);
    record.set("datacenter", datacenter);

    for field in ["SANTotalVol", "SANUsedVol", "SANFreeVol"] {
        let value = record.number(field);
        record.set(field, value);
    }
    set_vol_ratio(&mut record);

    let margin = record.number("SANTotalVol") * SAFETY_MARGIN_PCT / 100.0;
    record.set("SANFreeVol", record.number("SANFreeVol") - margin);
    record
}

/// Cluster rollup over the published host records.
pub fn cluster_rollup(
    hosts: &[Record],
    cluster: &str,
    datacenter: &str,
    now: DateTime<Utc>,
) -> Record {
    let mut record = aggregate::sum_records(hosts, cluster, now);
    record.set("datacenter", datacenter);
    set_vol_ratio(&mut record);
    record
}

/// Datacenter rollup over the published cluster records.
pub fn datacenter_rollup(clusters: &[Record], datacenter: &str, now: DateTime<Utc>) -> Record {
    let mut record = aggregate::sum_records(clusters, datacenter, now);
    set_vol_ratio(&mut record);
    record
}

/// Parent ratios are recomputed from the summed fields, never averaged.
fn set_vol_ratio(record: &mut Record) {
    let total = record.number("SANTotalVol");
    let ratio = if total > 0.0 {
        record.number("SANUsedVol") / total * 100.0
    } else {
        0.0
    };
    record.set("SANVolRatio", ratio);
}

/// Fetch the records of every pool of one SAN group.
pub async fn pool_records(
    agent: &SanAgent,
    host: &str,
    cluster: &str,
    datacenter: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Record>> {
    let pools = agent.pools().await?;

    let mut records = Vec::with_capacity(pools.len());
    for (index, name) in pools {
        let stats = pool_stats(agent, index).await?;
        records.push(pool_record(&name, host, cluster, datacenter, &stats, now));
    }
    Ok(records)
}

async fn pool_stats(agent: &SanAgent, index: u32) -> Result<PoolStats> {
    Ok(PoolStats {
        volume_count: agent.get_number(snmp::OID_VOLUME_COUNT, index).await?,
        volume_total: units::mib_to_gib(agent.get_number(snmp::OID_VOLUME_TOTAL, index).await?),
        volume_free: units::mib_to_gib(agent.get_number(snmp::OID_VOLUME_FREE, index).await?),
        replication_total: units::mib_to_gib(
            agent.get_number(snmp::OID_REPLICATION_TOTAL, index).await?,
        ),
        replication_used: units::mib_to_gib(
            agent.get_number(snmp::OID_REPLICATION_USED, index).await?,
        ),
        replication_free: units::mib_to_gib(
            agent.get_number(snmp::OID_REPLICATION_FREE, index).await?,
        ),
        snapshot_reserved: units::mib_to_gib(
            agent.get_number(snmp::OID_SNAPSHOT_RESERVED, index).await?,
        ),
        snapshot_used: units::mib_to_gib(agent.get_number(snmp::OID_SNAPSHOT_USED, index).await?),
        delegated_total: units::mib_to_gib(
            agent.get_number(snmp::OID_DELEGATED_TOTAL, index).await?,
        ),
        delegated_used: units::mib_to_gib(agent.get_number(snmp::OID_DELEGATED_USED, index).await?),
        volume_allocated: units::mib_to_gib(
            agent.get_number(snmp::OID_VOLUME_ALLOCATED, index).await?,
        ),
        thin_provision_free: units::mib_to_gib(
            agent.get_number(snmp::OID_THIN_PROVISION_FREE, index).await?,
        ),
        snapshot_free: units::mib_to_gib(agent.get_number(snmp::OID_SNAPSHOT_FREE, index).await?),
    })
}

/// Walk the configured hierarchy and publish records at every level.
pub async fn run(config: &Config, store: &Store, now: DateTime<Utc>) -> Result<()> {
    let index = &config.indexes.main;

    for (datacenter, clusters) in &config.san {
        let mut cluster_records = Vec::new();

        for (cluster, hosts) in clusters {
            let mut host_records = Vec::new();

            for host in hosts {
                let agent = SanAgent::connect(host, &config.snmp_community).await?;
                let pools = pool_records(&agent, host, cluster, datacenter, now).await?;
                for pool in &pools {
                    store.publish(index, &config.indexes.san_pools, pool).await?;
                }

                let record = host_rollup(&pools, host, cluster, datacenter, now);
                store.publish(index, &config.indexes.san_hosts, &record).await?;
                tracing::info!("published {} pools for SAN {}", pools.len(), host);
                host_records.push(record);
            }

            let record = cluster_rollup(&host_records, cluster, datacenter, now);
            store
                .publish(index, &config.indexes.san_clusters, &record)
                .await?;
            cluster_records.push(record);
        }

        let record = datacenter_rollup(&cluster_records, datacenter, now);
        store.publish(index, &config.indexes.san_dc, &record).await?;
        tracing::info!("published SAN rollup for datacenter {}", datacenter);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{
        cluster_rollup, datacenter_rollup, host_rollup, is_replication_pool, pool_record,
        PoolStats, USAGE_REPLICATION, USAGE_STORAGE,
    };

    fn posted() -> chrono::DateTime<chrono::Utc> {
        "2019-03-02T04:00:00Z".parse().unwrap()
    }

    fn storage_pool(name: &str, total: f64, free: f64) -> crate::Record {
        let stats = PoolStats {
            volume_count: 12.0,
            volume_total: total,
            volume_free: free,
            ..PoolStats::default()
        };
        pool_record(name, "san01", "par1-mut", "par", &stats, posted())
    }

    fn replication_pool(name: &str) -> crate::Record {
        let stats = PoolStats {
            volume_count: 0.0,
            volume_total: 200.0,
            volume_free: 180.0,
            ..PoolStats::default()
        };
        pool_record(name, "san01", "par1-mut", "par", &stats, posted())
    }

    #[test]
    fn pool_record_derives_usage() {
        let record = storage_pool("pool-a", 100.0, 60.0);
        assert_eq!(record.text("SANPoolsUsage"), Some(USAGE_STORAGE));
        assert!((record.number("SANUsedVol") - 40.0).abs() < f64::EPSILON);
        assert!((record.number("SANVolRatio") - 40.0).abs() < f64::EPSILON);
        assert_eq!(record.text("host"), Some("san01"));
        assert_eq!(record.text("datacenter"), Some("par"));
    }

    #[test]
    fn empty_pool_ratio_is_zero() {
        let stats = PoolStats::default();
        let record = pool_record("empty", "san01", "par1-mut", "par", &stats, posted());
        assert!(record.number("SANVolRatio").abs() < f64::EPSILON);
    }

    #[test]
    fn volume_free_pool_is_tagged_replication() {
        let record = replication_pool("replica");
        assert_eq!(record.text("SANPoolsUsage"), Some(USAGE_REPLICATION));
        assert!(is_replication_pool(&record));
        // still a full individual record
        assert!((record.number("SANTotalVol") - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn host_rollup_excludes_replication_pools_and_keeps_margin() {
        let pools = vec![
            storage_pool("pool-a", 100.0, 50.0),
            replication_pool("replica"),
        ];
        let record = host_rollup(&pools, "san01", "par1-mut", "par", posted());
        // the replication pool's 200 GiB never reach the host totals
        assert!((record.number("SANTotalVol") - 100.0).abs() < f64::EPSILON);
        assert!((record.number("SANUsedVol") - 50.0).abs() < f64::EPSILON);
        // 50 free minus 5% of 100 total
        assert!((record.number("SANFreeVol") - 45.0).abs() < f64::EPSILON);
        assert!((record.number("SANVolRatio") - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn replication_only_host_reports_zeroed_totals() {
        let pools = vec![replication_pool("replica")];
        let record = host_rollup(&pools, "san02", "par1-mut", "par", posted());
        assert!(record.number("SANTotalVol").abs() < f64::EPSILON);
        assert!(record.number("SANUsedVol").abs() < f64::EPSILON);
        assert!(record.number("SANFreeVol").abs() < f64::EPSILON);
        assert!(record.number("SANVolRatio").abs() < f64::EPSILON);
    }

    #[test]
    fn cluster_and_datacenter_recompute_ratio() {
        let hosts = vec![
            host_rollup(&[storage_pool("a", 100.0, 50.0)], "san01", "c1", "par", posted()),
            host_rollup(&[storage_pool("b", 300.0, 150.0)], "san02", "c1", "par", posted()),
        ];
        let cluster = cluster_rollup(&hosts, "c1", "par", posted());
        assert!((cluster.number("SANTotalVol") - 400.0).abs() < f64::EPSILON);
        assert!((cluster.number("SANUsedVol") - 200.0).abs() < f64::EPSILON);
        assert!((cluster.number("SANVolRatio") - 50.0).abs() < f64::EPSILON);

        let datacenter = datacenter_rollup(&[cluster], "par", posted());
        assert!((datacenter.number("SANVolRatio") - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn idle_datacenter_ratio_is_zero_not_nan() {
        let record = datacenter_rollup(&[], "idle", posted());
        assert!(record.number("SANVolRatio").abs() < f64::EPSILON);
        assert!(record.number("SANTotalVol").abs() < f64::EPSILON);
    }
}
