//!
//! SNMP collaborator for the SAN collector: GET and WALK against UDP 161
//! with a community string, plus the per-pool columns of the SAN vendor
//! MIB branch.
//!

use std::collections::BTreeMap;
use std::time::Duration;

use csnmp::{ObjectIdentifier, ObjectValue, Snmp2cClient};

use crate::{Error, Result};

/// Pool name table; one entry per storage pool.
pub const OID_POOL_NAMES: &str = "1.3.6.1.4.1.12740.16.1.1.1.3.1";

/// Number of volumes hosted on the pool.
pub const OID_VOLUME_COUNT: &str = "1.3.6.1.4.1.12740.16.1.2.1.16.1";
/// Total volume space, MiB.
pub const OID_VOLUME_TOTAL: &str = "1.3.6.1.4.1.12740.16.1.2.1.1.1";
/// Free volume space, MiB.
pub const OID_VOLUME_FREE: &str = "1.3.6.1.4.1.12740.16.1.2.1.3.1";
/// Total replication space, MiB.
pub const OID_REPLICATION_TOTAL: &str = "1.3.6.1.4.1.12740.16.1.2.1.4.1";
/// Used replication space, MiB.
pub const OID_REPLICATION_USED: &str = "1.3.6.1.4.1.12740.16.1.2.1.5.1";
/// Free replication space, MiB.
pub const OID_REPLICATION_FREE: &str = "1.3.6.1.4.1.12740.16.1.2.1.6.1";
/// Reserved snapshot space, MiB.
pub const OID_SNAPSHOT_RESERVED: &str = "1.3.6.1.4.1.12740.16.1.2.1.9.1";
/// Used snapshot space, MiB.
pub const OID_SNAPSHOT_USED: &str = "1.3.6.1.4.1.12740.16.1.2.1.10.1";
/// Total delegated space, MiB.
pub const OID_DELEGATED_TOTAL: &str = "1.3.6.1.4.1.12740.16.1.2.1.17.1";
/// Used delegated space, MiB.
pub const OID_DELEGATED_USED: &str = "1.3.6.1.4.1.12740.16.1.2.1.18.1";
/// Space allocated to volumes, MiB.
pub const OID_VOLUME_ALLOCATED: &str = "1.3.6.1.4.1.12740.16.1.2.1.21.1";
/// Free thin-provisioned space, MiB.
pub const OID_THIN_PROVISION_FREE: &str = "1.3.6.1.4.1.12740.16.1.2.1.23.1";
/// Free snapshot space, MiB.
pub const OID_SNAPSHOT_FREE: &str = "1.3.6.1.4.1.12740.16.1.2.1.25.1";

const SNMP_PORT: u16 = 161;
const SNMP_TIMEOUT: Duration = Duration::from_secs(5);

/// SNMP2c session with one SAN group.
pub struct SanAgent {
    client: Snmp2cClient,
}

impl SanAgent {
    /// Open a session with `host` using the configured community.
    pub async fn connect(host: &str, community: &str) -> Result<Self> {
        let target = tokio::net::lookup_host((host, SNMP_PORT))
            .await?
            .next()
            .ok_or_else(|| Error::Collection(format!("cannot resolve SAN host {}", host)))?;

        let client = Snmp2cClient::new(
            target,
            community.as_bytes().to_vec(),
            None,
            Some(SNMP_TIMEOUT),
            0,
        )
        .await?;

        Ok(Self { client })
    }

    /// List the pools of the SAN group: table index → pool name.
    ///
    /// The factory `default` pool is not a storage pool and is left out.
    pub async fn pools(&self) -> Result<BTreeMap<u32, String>> {
        let binds = self.client.walk(parse_oid(OID_POOL_NAMES)?).await?;

        let mut pools = BTreeMap::new();
        for (oid, value) in binds {
            let index = match last_arc(&oid) {
                Some(index) => index,
                None => continue,
            };
            if let Some(name) = text(&value) {
                if name != "default" {
                    pools.insert(index, name);
                }
            }
        }
        Ok(pools)
    }

    /// GET one numeric column value for a pool.
    pub async fn get_number(&self, column: &str, pool_index: u32) -> Result<f64> {
        let oid = parse_oid(&format!("{}.{}", column, pool_index))?;
        let value = self.client.get(oid).await?;
        numeric(&value).ok_or_else(|| {
            Error::Collection(format!(
                "non-numeric SNMP value at {}.{}",
                column, pool_index
            ))
        })
    }
}

fn parse_oid(oid: &str) -> Result<ObjectIdentifier> {
    oid.parse()
        .map_err(|_| Error::Collection(format!("invalid OID {}", oid)))
}

/// Last arc of an OID: the table row index.
fn last_arc(oid: &ObjectIdentifier) -> Option<u32> {
    oid.to_string().rsplit('.').next()?.parse().ok()
}

/// Numeric reading of any SNMP integer kind; agents also ship numbers as
/// display strings.
fn numeric(value: &ObjectValue) -> Option<f64> {
    match value {
        ObjectValue::Integer(v) => Some(f64::from(*v)),
        ObjectValue::Counter32(v) | ObjectValue::Unsigned32(v) | ObjectValue::TimeTicks(v) => {
            Some(f64::from(*v))
        }
        ObjectValue::Counter64(v) => Some(*v as f64),
        ObjectValue::String(bytes) => String::from_utf8_lossy(bytes).trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &ObjectValue) -> Option<String> {
    match value {
        ObjectValue::String(bytes) => Some(String::from_utf8_lossy(bytes).trim().to_string()),
        _ => None,
    }
}
