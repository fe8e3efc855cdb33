//!
//! Rollup core: averaging within an entity, summing across children, and
//! the store-backed helpers the rollup binaries build on.
//!
//! A rollup never carries a ratio upward. Sums aggregate; every `*Ratio`
//! field is recomputed at the parent level from the summed numerator and
//! denominator.
//!

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::{Filter, Record, Result, Store};

/// Fields naming the entity rather than measuring it.
const IDENTITY_FIELDS: &[&str] = &["name", "host", "cluster", "datacenter", "post_date"];

/// Marker of derived ratio fields.
const RATIO_MARKER: &str = "Ratio";

/// Hypervisor fields summed into a cluster record.
pub const HV_ROLLUP_FIELDS: &[&str] = &[
    "pRAMfree",
    "pRAMtotal",
    "pRAMused",
    "vRAMfree",
    "vRAMallocated",
    "pCPU",
    "vCPUfree",
    "vCPUallocated",
];

/// Backup host fields summed into a datacenter record.
pub const BACKUP_ROLLUP_FIELDS: &[&str] = &[
    "volumeLogUsed",
    "volumeLogFree",
    "volumeUsed",
    "volumeFree",
    "volumeTotal",
];

/// Should this field be carried into a parent level sum?
#[must_use]
pub fn is_rollup_field(field: &str) -> bool {
    !IDENTITY_FIELDS.contains(&field) && !field.contains(RATIO_MARKER)
}

/// Arithmetic mean of a field across records; 0.0 when none match.
#[must_use]
pub fn mean(records: &[Record], field: &str) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records.iter().map(|record| record.number(field)).sum();
    sum / records.len() as f64
}

/// Sum every rollup-eligible numeric field of `children` into a fresh
/// record for `name`. An empty child list yields a record with no metric
/// fields, which read back as 0.
#[must_use]
pub fn sum_records(children: &[Record], name: &str, now: DateTime<Utc>) -> Record {
    let mut record = Record::new(name, now);
    if let Some(first) = children.first() {
        for (field, value) in first.iter() {
            if !is_rollup_field(field) || !value.is_number() {
                continue;
            }
            let sum: f64 = children.iter().map(|child| child.number(field)).sum();
            record.set(field, sum);
        }
    }
    record
}

/// 24 hour mean of `field` over the records published for `name`.
pub async fn mean_by_name(
    store: &Store,
    index: &str,
    doc_type: &str,
    name: &str,
    field: &str,
) -> Result<f64> {
    let filter = Filter::new().term("_type", doc_type).term("name", name);
    let records = store.search(index, &filter).await?;
    Ok(mean(&records, field))
}

/// Distinct values of `field` among the records matching `filter`,
/// in first-seen order.
pub async fn distinct_values(
    store: &Store,
    index: &str,
    doc_type: &str,
    filter: Filter,
    field: &str,
) -> Result<Vec<String>> {
    let records = store.search(index, &filter.term("_type", doc_type)).await?;

    let mut values: Vec<String> = Vec::new();
    for record in records {
        if let Some(value) = record.text(field) {
            if !values.iter().any(|seen| seen == value) {
                values.push(value.to_string());
            }
        }
    }
    Ok(values)
}

/// Parent level value of `field`: the sum of the per-child 24 hour means.
pub async fn sum_child_means(
    store: &Store,
    index: &str,
    doc_type: &str,
    children: &[String],
    field: &str,
) -> Result<f64> {
    let mut sum = 0.0;
    for child in children {
        sum += mean_by_name(store, index, doc_type, child, field).await?;
    }
    Ok(sum)
}

/// Finish a hypervisor cluster record: overcommit-adjusted ratios and the
/// remaining-VM counts per configured profile.
pub fn finish_hypervisor_cluster(record: &mut Record, config: &Config) {
    let ram_capacity = record.number("pRAMtotal") * config.hv_ram_overcommit / 100.0;
    let ram_ratio = if ram_capacity > 0.0 {
        record.number("vRAMallocated") / ram_capacity * 100.0
    } else {
        0.0
    };
    record.set("RAMratio", ram_ratio);

    let cpu_capacity = record.number("pCPU") * config.hv_cpu_overcommit / 100.0;
    let cpu_ratio = if cpu_capacity > 0.0 {
        record.number("vCPUallocated") / cpu_capacity * 100.0
    } else {
        0.0
    };
    record.set("CPUratio", cpu_ratio);

    let vcpu_free = record.number("vCPUfree") as i64;
    let vram_free = record.number("vRAMfree") as i64;
    for vm_type in &config.vm_type {
        if vm_type.cpu == 0 || vm_type.ram == 0 {
            continue;
        }
        let by_cpu = vcpu_free / vm_type.cpu as i64;
        let by_ram = vram_free / vm_type.ram as i64;
        let field = format!("remaining_vm_type_{}", vm_type.kind);
        record.set(&field, by_cpu.max(by_ram));
    }
}

/// Finish a backup datacenter record: the volume ratio from the summed
/// totals. A datacenter with no reported volume is anomalous but still
/// published, with a zero ratio.
pub fn finish_backup_datacenter(record: &mut Record) {
    let total = record.number("volumeTotal");
    if total > 0.0 {
        record.set("volumeRatio", record.number("volumeUsed") / total * 100.0);
    } else {
        tracing::warn!("no backup volume reported for {}", record.name());
        record.set("volumeRatio", 0.0);
    }
}
