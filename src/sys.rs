//!
//! Local OS collaborators: shell commands, `/proc/meminfo`, and the per-VM
//! stat files written by the external stats script.
//!

use std::path::Path;

use crate::{Error, Result};

/// Directory the external stats script writes one file per VM into.
pub const VM_STATS_DIR: &str = "/tmp/capacity_planning";

/// Run a command and return its stdout.
///
/// A spawn failure or non-zero exit means a mandatory source is gone, which
/// is fatal for the run.
pub async fn run(cmd: &str, args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new(cmd)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::Collection(format!("failed to run {}: {}", cmd, e)))?;

    if !output.status.success() {
        return Err(Error::Collection(format!(
            "{} exited with {}",
            cmd, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Fully qualified name of the local host: `hostname` + `hostname -d`.
pub async fn fqdn() -> Result<String> {
    let hostname = run("hostname", &[]).await?;
    let domain = run("hostname", &["-d"]).await?;
    Ok(format!("{}.{}", hostname.trim(), domain.trim()))
}

/// Number of available processors.
pub async fn nproc() -> Result<u64> {
    let output = run("nproc", &[]).await?;
    output
        .trim()
        .parse()
        .map_err(|_| Error::Collection(format!("unparsable nproc output: {}", output.trim())))
}

/// Memory counters from `/proc/meminfo`, in KiB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    pub total: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
    pub slab: u64,
}

impl MemInfo {
    /// Parse `/proc/meminfo` content. `MemTotal` and `MemFree` are
    /// mandatory; the reclaimable counters default to 0 when absent.
    pub fn parse(content: &str) -> Result<Self> {
        let mut info = Self::default();
        let mut seen_total = false;
        let mut seen_free = false;

        for line in content.lines() {
            if let Some((field, rest)) = line.split_once(':') {
                let value: u64 = match rest.split_whitespace().next().map(str::parse) {
                    Some(Ok(value)) => value,
                    _ => continue,
                };
                match field.trim() {
                    "MemTotal" => {
                        info.total = value;
                        seen_total = true;
                    }
                    "MemFree" => {
                        info.free = value;
                        seen_free = true;
                    }
                    "Buffers" => info.buffers = value,
                    "Cached" => info.cached = value,
                    "Slab" => info.slab = value,
                    _ => {}
                }
            }
        }

        if !seen_total || !seen_free || info.total == 0 {
            return Err(Error::collection("missing MemTotal/MemFree in meminfo"));
        }
        Ok(info)
    }

    /// Free memory for planning purposes: reclaimable pages count as free.
    #[must_use]
    pub fn free_for_planning(&self) -> u64 {
        self.free + self.buffers + self.cached + self.slab
    }

    /// Used memory once reclaimable pages are taken out.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free_for_planning())
    }
}

/// Read and parse `/proc/meminfo`.
pub async fn meminfo() -> Result<MemInfo> {
    let content = tokio::fs::read_to_string("/proc/meminfo").await?;
    MemInfo::parse(&content)
}

/// Counters for one virtual machine, parsed from its stat file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmStats {
    pub name: String,
    pub used_memory_kib: u64,
    pub cpus: u64,
    pub max_memory_kib: u64,
}

impl VmStats {
    /// Parse one stat file. The file is line oriented with `Name:`,
    /// `Used memory:`, `CPU(s):` and `Max memory:` entries; memory values
    /// carry a unit suffix.
    ///
    /// Returns `None` when the file does not describe a usable VM: missing
    /// name, zero CPUs or zero allocated memory.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let mut stats = Self::default();

        for line in content.lines() {
            if let Some((field, rest)) = line.split_once(':') {
                let value = rest.trim();
                match field.trim() {
                    "Name" => stats.name = value.to_string(),
                    "Used memory" => stats.used_memory_kib = first_number(value),
                    "CPU(s)" => stats.cpus = first_number(value),
                    "Max memory" => stats.max_memory_kib = first_number(value),
                    _ => {}
                }
            }
        }

        if stats.name.is_empty() || stats.cpus == 0 || stats.max_memory_kib == 0 {
            return None;
        }
        Some(stats)
    }
}

/// Leading number of a value like `4194304 KiB`; malformed values degrade
/// to 0 and are caught by the validity check.
fn first_number(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Run the external script that refreshes the per-VM stat files.
pub async fn refresh_vm_stats(working_dir: &str) -> Result<()> {
    let script = Path::new(working_dir).join("stats.sh");
    let script = script.to_string_lossy();
    run("/bin/sh", &[script.as_ref()]).await?;
    Ok(())
}

/// Collect the per-VM stat files for this host. Unreadable or invalid files
/// are logged and skipped; only the directory itself is mandatory.
pub async fn vm_stats(fqdn: &str) -> Result<Vec<VmStats>> {
    let dir = Path::new(VM_STATS_DIR).join(format!("{}-vms", fqdn));
    let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
        Error::Collection(format!("failed to list VM stats in {}: {}", dir.display(), e))
    })?;

    let mut stats = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("skipping VM stat file {}: {}", path.display(), e);
                continue;
            }
        };
        match VmStats::parse(&content) {
            Some(vm) => stats.push(vm),
            None => tracing::warn!("skipping invalid VM stat file {}", path.display()),
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::{MemInfo, VmStats};

    const MEMINFO: &str = "MemTotal:       65863556 kB\n\
                           MemFree:        10842676 kB\n\
                           MemAvailable:   41733064 kB\n\
                           Buffers:         1750056 kB\n\
                           Cached:         27574696 kB\n\
                           SwapCached:            0 kB\n\
                           Slab:            2542812 kB\n";

    #[test]
    fn parses_meminfo() {
        let info = MemInfo::parse(MEMINFO).unwrap();
        assert_eq!(info.total, 65_863_556);
        assert_eq!(info.free, 10_842_676);
        assert_eq!(info.cached, 27_574_696);
        assert_eq!(
            info.free_for_planning(),
            10_842_676 + 1_750_056 + 27_574_696 + 2_542_812
        );
        assert_eq!(info.used(), info.total - info.free_for_planning());
    }

    #[test]
    fn meminfo_requires_totals() {
        assert!(MemInfo::parse("Cached: 42 kB\n").is_err());
        assert!(MemInfo::parse("").is_err());
    }

    #[test]
    fn parses_vm_stat_file() {
        let content = "Name:           web01\n\
                       CPU(s):         4\n\
                       Max memory:     8388608 KiB\n\
                       Used memory:    4194304 KiB\n";
        let vm = VmStats::parse(content).unwrap();
        assert_eq!(
            vm,
            VmStats {
                name: "web01".to_string(),
                used_memory_kib: 4_194_304,
                cpus: 4,
                max_memory_kib: 8_388_608,
            }
        );
    }

    #[test]
    fn rejects_unusable_vm_files() {
        // no name
        assert!(VmStats::parse("CPU(s): 4\nMax memory: 1024 KiB\n").is_none());
        // zero cpus
        assert!(VmStats::parse("Name: a\nCPU(s): 0\nMax memory: 1024 KiB\n").is_none());
        // malformed allocation degrades to 0 and fails the validity check
        assert!(VmStats::parse("Name: a\nCPU(s): 2\nMax memory: lots\n").is_none());
        assert!(VmStats::parse("").is_none());
    }

    #[test]
    fn used_memory_is_optional() {
        let vm = VmStats::parse("Name: a\nCPU(s): 2\nMax memory: 1024 KiB\n").unwrap();
        assert_eq!(vm.used_memory_kib, 0);
    }
}
