//!
//! ZFS collaborators for the backup pool collector.
//!

use crate::{sys, Error, Result};

const ZFS: &str = "/sbin/zfs";

/// Used and free bytes of a dataset, from `zfs list <dataset> -Hp`.
pub async fn usage(dataset: &str) -> Result<(u64, u64)> {
    let output = sys::run(ZFS, &["list", dataset, "-Hp"]).await?;
    parse_list(&output)
}

/// Compression ratio of a dataset. A malformed value is an optional-field
/// failure and degrades to 0.0.
pub async fn compress_ratio(dataset: &str) -> Result<f64> {
    let output = sys::run(ZFS, &["get", "compressratio", dataset, "-Hp"]).await?;
    Ok(parse_compress_ratio(&output))
}

/// Logically used bytes of a dataset, before compression.
pub async fn logical_used(dataset: &str) -> Result<u64> {
    let output = sys::run(ZFS, &["get", "logicalused", dataset, "-Hp"]).await?;
    parse_property(&output)?
        .parse()
        .map_err(|_| Error::collection("unparsable logicalused value"))
}

/// `zfs list -Hp` prints one tab-separated line: name, used, avail, refer,
/// mountpoint.
fn parse_list(output: &str) -> Result<(u64, u64)> {
    let mut columns = output.split('\t').filter(|c| !c.trim().is_empty());
    let _name = columns.next();
    let used = columns.next().and_then(|c| c.trim().parse().ok());
    let free = columns.next().and_then(|c| c.trim().parse().ok());

    match (used, free) {
        (Some(used), Some(free)) => Ok((used, free)),
        _ => Err(Error::collection("unparsable zfs list output")),
    }
}

/// Third column of `zfs get -Hp`: the property value.
fn parse_property(output: &str) -> Result<&str> {
    output
        .split('\t')
        .nth(2)
        .map(str::trim)
        .ok_or_else(|| Error::collection("unparsable zfs get output"))
}

/// Ratio values print with a trailing `x` (e.g. `1.58x`).
fn parse_compress_ratio(output: &str) -> f64 {
    parse_property(output)
        .map(|value| value.trim_end_matches('x').parse().unwrap_or(0.0))
        .unwrap_or(0.0)
}
