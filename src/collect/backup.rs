//!
//! ZFS backup pool collector.
//!

use chrono::{DateTime, Utc};

use crate::{sys, units, zfs, Error, Record, Result};

/// Dataset holding the backups.
const DATASET: &str = "backup";

/// Raw readings for one backup host.
#[derive(Debug, Clone)]
pub struct BackupInput {
    pub fqdn: String,
    pub used_bytes: u64,
    pub free_bytes: u64,
    /// 0.0 when the ratio was unavailable or malformed.
    pub compress_ratio: f64,
    pub logical_used_bytes: u64,
}

/// Gather the raw readings from the local host.
pub async fn gather() -> Result<BackupInput> {
    let fqdn = sys::fqdn().await?;
    let (used_bytes, free_bytes) = zfs::usage(DATASET).await?;
    let compress_ratio = zfs::compress_ratio(DATASET).await?;
    let logical_used_bytes = zfs::logical_used(DATASET).await?;
    Ok(BackupInput {
        fqdn,
        used_bytes,
        free_bytes,
        compress_ratio,
        logical_used_bytes,
    })
}

/// Build the backup host record. A pool reporting zero capacity means the
/// mandatory usage reading is broken, which is fatal for the run.
pub fn host_record(input: &BackupInput, datacenter: &str, now: DateTime<Utc>) -> Result<Record> {
    let used = units::bytes_to_gib(input.used_bytes as f64);
    let free = units::bytes_to_gib(input.free_bytes as f64);
    let total = used + free;
    if total <= 0 {
        return Err(Error::collection("backup volume reports zero capacity"));
    }

    let ratio = used as f64 * 100.0 / total as f64;
    let logical_free = (free as f64 * input.compress_ratio) as i64;

    Ok(Record::new(&input.fqdn, now)
        .with("volumeUsed", used)
        .with("volumeFree", free)
        .with("volumeTotal", total)
        .with("volumeRatio", ratio)
        .with("compressRatio", input.compress_ratio)
        .with("volumeLogUsed", units::bytes_to_gib(input.logical_used_bytes as f64))
        .with("volumeLogFree", logical_free)
        .with("datacenter", datacenter))
}
