//!
//! Hypervisor collector: one record per running VM plus the host record
//! with its overcommit-adjusted allocation ratios.
//!

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::sys::{self, MemInfo, VmStats};
use crate::{units, Error, Record, Result};

/// Raw readings for one hypervisor host.
#[derive(Debug, Clone)]
pub struct HostInput {
    pub fqdn: String,
    pub mem: MemInfo,
    pub pcpu: u64,
    /// Valid VM stat files only; broken ones were dropped while gathering.
    pub vms: Vec<VmStats>,
}

/// Refresh the VM stat files and gather all raw readings.
pub async fn gather(config: &Config) -> Result<HostInput> {
    let fqdn = sys::fqdn().await?;
    let mem = sys::meminfo().await?;
    let pcpu = sys::nproc().await?;
    sys::refresh_vm_stats(&config.working_dir).await?;
    let vms = sys::vm_stats(&fqdn).await?;
    Ok(HostInput {
        fqdn,
        mem,
        pcpu,
        vms,
    })
}

/// Record for one virtual machine.
#[must_use]
pub fn vm_record(host: &str, cluster: &str, vm: &VmStats, now: DateTime<Utc>) -> Record {
    Record::new(&vm.name, now)
        .with("host", host)
        .with("cluster", cluster)
        .with("vram_used", vm.used_memory_kib)
        .with("cpu", vm.cpus)
        .with("maxmem", vm.max_memory_kib)
}

/// Build the hypervisor host record. Allocation totals count only the VMs
/// that passed validation.
pub fn host_record(input: &HostInput, config: &Config, now: DateTime<Utc>) -> Result<Record> {
    if input.pcpu == 0 {
        return Err(Error::collection("host reports zero processors"));
    }

    let cpu_capacity = input.pcpu as f64 * config.hv_cpu_overcommit / 100.0;
    let ram_capacity_kib = input.mem.total as f64 * config.hv_ram_overcommit / 100.0;
    if cpu_capacity <= 0.0 || ram_capacity_kib <= 0.0 {
        return Err(Error::config("overcommit configuration yields zero capacity"));
    }

    let vcpu_allocated: u64 = input.vms.iter().map(|vm| vm.cpus).sum();
    let vram_allocated_kib: u64 = input.vms.iter().map(|vm| vm.max_memory_kib).sum();

    Ok(Record::new(&input.fqdn, now)
        .with("cluster", config.cluster.as_str())
        .with("pRAMfree", units::kib_to_gib(input.mem.free_for_planning() as f64))
        .with("pRAMused", units::kib_to_gib(input.mem.used() as f64))
        .with("pRAMtotal", units::kib_to_gib(input.mem.total as f64))
        .with("pCPU", input.pcpu)
        .with("vRAMallocated", units::kib_to_gib(vram_allocated_kib as f64))
        .with("vCPUallocated", vcpu_allocated)
        .with("CPUratio", vcpu_allocated as f64 / cpu_capacity * 100.0)
        .with("RAMratio", vram_allocated_kib as f64 / ram_capacity_kib * 100.0)
        .with("vCPUfree", (cpu_capacity - vcpu_allocated as f64) as i64)
        .with(
            "vRAMfree",
            units::kib_to_gib(ram_capacity_kib - vram_allocated_kib as f64),
        ))
}

#[cfg(test)]
mod test {
    use super::{host_record, vm_record, HostInput};
    use crate::config::Config;
    use crate::sys::{MemInfo, VmStats};

    const GIB_KIB: u64 = 1024 * 1024;

    fn posted() -> chrono::DateTime<chrono::Utc> {
        "2019-03-02T04:00:00Z".parse().unwrap()
    }

    fn config() -> Config {
        let sample = r#"{
            "logs": "/var/log/capacity_planning",
            "url": "http://search.example.net:9200",
            "indexes": {
                "main": "capacity", "backup_hosts": "backuphost", "vm": "vm",
                "hv": "hv", "san_pools": "sanpool", "san_hosts": "sanhost",
                "san_dc": "sandc", "san_clusters": "sancluster",
                "backup_dc": "backupdc", "clusters": "cluster"
            },
            "datacenter": "par",
            "cluster": "par1-mut",
            "hv_cpu_overcommit": 200,
            "hv_ram_overcommit": 150,
            "vm_type": [],
            "snmp_community": "public",
            "san": {},
            "working_dir": "/opt/capacity"
        }"#;
        Config::from_slice(sample.as_bytes()).unwrap()
    }

    fn input() -> HostInput {
        HostInput {
            fqdn: "hv01.example.net".to_string(),
            mem: MemInfo {
                total: 64 * GIB_KIB,
                free: 16 * GIB_KIB,
                buffers: 2 * GIB_KIB,
                cached: 6 * GIB_KIB,
                slab: 0,
            },
            pcpu: 24,
            vms: vec![
                VmStats {
                    name: "web01".to_string(),
                    used_memory_kib: 4 * GIB_KIB,
                    cpus: 8,
                    max_memory_kib: 16 * GIB_KIB,
                },
                VmStats {
                    name: "db01".to_string(),
                    used_memory_kib: 12 * GIB_KIB,
                    cpus: 16,
                    max_memory_kib: 32 * GIB_KIB,
                },
            ],
        }
    }

    #[test]
    fn vm_records_carry_scope() {
        let input = input();
        let record = vm_record(&input.fqdn, "par1-mut", &input.vms[0], posted());
        assert_eq!(record.name(), "web01");
        assert_eq!(record.text("host"), Some("hv01.example.net"));
        assert_eq!(record.text("cluster"), Some("par1-mut"));
        assert_eq!(record.number("cpu") as u64, 8);
    }

    #[test]
    fn host_record_sums_valid_vms() {
        let record = host_record(&input(), &config(), posted()).unwrap();
        assert_eq!(record.number("pRAMtotal") as i64, 64);
        assert_eq!(record.number("pRAMfree") as i64, 24);
        assert_eq!(record.number("pRAMused") as i64, 40);
        assert_eq!(record.number("pCPU") as u64, 24);
        assert_eq!(record.number("vCPUallocated") as u64, 24);
        assert_eq!(record.number("vRAMallocated") as i64, 48);
    }

    #[test]
    fn overcommit_ratios() {
        let record = host_record(&input(), &config(), posted()).unwrap();
        // 24 allocated vCPUs over 24 * 200% physical
        assert!((record.number("CPUratio") - 50.0).abs() < f64::EPSILON);
        // 48 GiB allocated over 64 * 150%
        assert!((record.number("RAMratio") - 50.0).abs() < f64::EPSILON);
        assert_eq!(record.number("vCPUfree") as i64, 24);
        assert_eq!(record.number("vRAMfree") as i64, 48);
    }

    #[test]
    fn idle_host_reports_zero_allocation() {
        let mut idle = input();
        idle.vms.clear();
        let record = host_record(&idle, &config(), posted()).unwrap();
        assert_eq!(record.number("vCPUallocated") as u64, 0);
        assert!(record.number("CPUratio").abs() < f64::EPSILON);
        assert_eq!(record.number("vCPUfree") as i64, 48);
    }

    #[test]
    fn zero_processors_is_fatal() {
        let mut broken = input();
        broken.pcpu = 0;
        assert!(host_record(&broken, &config(), posted()).is_err());
    }
}
