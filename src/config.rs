//!
//! Run configuration, read once at startup. Every binary shares one JSON
//! file; each reads the keys it needs.
//!

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{Error, Result};

/// Logical index names in the store. The `main` index is the first URL
/// segment; the others are document types below it.
#[derive(Debug, Clone, Deserialize)]
pub struct Indexes {
    pub main: String,
    pub backup_hosts: String,
    pub vm: String,
    pub hv: String,
    pub san_pools: String,
    pub san_hosts: String,
    pub san_dc: String,
    pub san_clusters: String,
    pub backup_dc: String,
    pub clusters: String,
}

/// One provisionable VM profile, used to size remaining cluster capacity.
#[derive(Debug, Clone, Deserialize)]
pub struct VmType {
    #[serde(rename = "type")]
    pub kind: String,
    /// vCPUs per instance
    pub cpu: u64,
    /// GiB of RAM per instance
    pub ram: u64,
}

/// SAN hierarchy: datacenter → cluster → SAN group hostnames. Depth is
/// always exactly three.
pub type SanMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// The shared configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log file base path; `.log` is appended.
    pub logs: String,
    /// Store base URL.
    pub url: String,
    pub indexes: Indexes,
    /// Datacenter this host reports into.
    pub datacenter: String,
    /// Cluster this hypervisor reports into.
    pub cluster: String,
    /// Percentage of physical CPU that may be allocated to guests.
    pub hv_cpu_overcommit: f64,
    /// Percentage of physical RAM that may be allocated to guests.
    pub hv_ram_overcommit: f64,
    pub vm_type: Vec<VmType>,
    pub snmp_community: String,
    pub san: SanMap,
    /// Directory holding the external VM stats script.
    pub working_dir: String,
}

impl Config {
    /// Load and validate the configuration file.
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_slice(&data)
    }

    /// Parse and validate configuration bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| Error::Config(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.logs.is_empty() {
            return Err(Error::config("empty 'logs' path"));
        }
        if self.url.is_empty() {
            return Err(Error::config("empty store 'url'"));
        }
        if self.datacenter.is_empty() {
            return Err(Error::config("empty 'datacenter'"));
        }
        if self.cluster.is_empty() {
            return Err(Error::config("empty 'cluster'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    const SAMPLE: &str = r#"{
        "logs": "/var/log/capacity_planning",
        "url": "http://search.example.net:9200",
        "indexes": {
            "main": "capacity",
            "backup_hosts": "backuphost",
            "vm": "vm",
            "hv": "hv",
            "san_pools": "sanpool",
            "san_hosts": "sanhost",
            "san_dc": "sandc",
            "san_clusters": "sancluster",
            "backup_dc": "backupdc",
            "clusters": "cluster"
        },
        "datacenter": "par",
        "cluster": "par1-mut",
        "hv_cpu_overcommit": 200,
        "hv_ram_overcommit": 150,
        "vm_type": [
            { "type": "small", "cpu": 2, "ram": 4 },
            { "type": "large", "cpu": 8, "ram": 32 }
        ],
        "snmp_community": "public",
        "san": {
            "par": {
                "par1-mut": ["san01.example.net", "san02.example.net"]
            }
        },
        "working_dir": "/opt/capacity"
    }"#;

    #[test]
    fn parses_sample() {
        let config = Config::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(config.indexes.san_pools, "sanpool");
        assert!((config.hv_ram_overcommit - 150.0).abs() < f64::EPSILON);
        assert_eq!(config.vm_type[1].kind, "large");
        assert_eq!(config.san["par"]["par1-mut"].len(), 2);
    }

    #[test]
    fn rejects_empty_url() {
        let broken = SAMPLE.replace("http://search.example.net:9200", "");
        let err = Config::from_slice(broken.as_bytes()).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = Config::from_slice(b"{ not json").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
