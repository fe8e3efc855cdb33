//!
//! Capacity planning collectors and rollups.
//!
//! Every binary in this crate is one linear pass: read the configuration,
//! gather raw numbers from the local host or a remote SNMP agent, derive the
//! simple ratios, and publish flat JSON documents to the search store. The
//! rollup binaries instead read the last 24 hours of published records back
//! from the store and republish sums one hierarchy level up. An external
//! scheduler re-runs the binaries periodically; a failed run simply logs and
//! exits non-zero.
//!
//! ## Store access
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), capacity_planner::Error> {
//! use capacity_planner::{Filter, Record, Store};
//!
//! let store = Store::new("http://search.example.net:9200")?;
//!
//! let record = Record::new("hv01.example.net", chrono::Utc::now())
//!     .with("cluster", "par1")
//!     .with("pCPU", 48_u64);
//! store.publish("capacity", "hv", &record).await?;
//!
//! let filter = Filter::new().term("_type", "hv").term("cluster", "par1");
//! let last_day = store.search("capacity", &filter).await?;
//! # let _ = last_day;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use serde_json::json;

pub mod aggregate;
pub mod collect;
pub mod config;
pub mod logging;
pub mod record;
pub mod snmp;
pub mod sys;
pub mod units;
pub mod zfs;

pub use config::Config;
pub use record::Record;

/// Error returned by library functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing, unparsable or empty mandatory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mandatory external source failed or returned unparsable data
    #[error("Collection failed: {0}")]
    Collection(String),

    /// Failure returned by the HTTP store
    #[error("HTTP failed {0}, {1}")]
    WebServer(u16, String),

    /// HTTP client error
    #[error("Reqwest: {0}")]
    HTTPClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL: {0}")]
    URL(#[from] url::ParseError),

    /// SNMP request error
    #[error("SNMP: {0}")]
    Snmp(#[from] csnmp::SnmpClientError),

    /// IO Errors
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn config(err: &str) -> Self {
        Self::Config(err.to_string())
    }

    /// Create a collection error
    #[must_use]
    pub fn collection(err: &str) -> Self {
        Self::Collection(err.to_string())
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Timeout applied to every store request.
const STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Exact-match constraints for a store query. The trailing 24 hour window on
/// `post_date` is implicit; every query carries it.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    terms: Vec<(String, serde_json::Value)>,
}

impl Filter {
    /// Create an empty filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match constraint on a field
    #[must_use]
    pub fn term(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
        self.terms.push((field.to_string(), value.into()));
        self
    }

    fn to_query(&self) -> serde_json::Value {
        let must: Vec<serde_json::Value> = self
            .terms
            .iter()
            .map(|(field, value)| json!({ "term": { (field.as_str()): value.clone() } }))
            .collect();

        json!({
            "query": {
                "bool": {
                    "must": must,
                    "filter": {
                        "range": {
                            "post_date": { "gt": "now-24h" }
                        }
                    }
                }
            }
        })
    }
}

/// Client for the HTTP search store every record is published to and read
/// back from. One instance per run; all requests share the fixed timeout.
#[derive(Debug, Clone)]
pub struct Store {
    base_url: url::Url,
    client: reqwest::Client,
}

impl Store {
    /// Create a client for the store at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = url::Url::parse(base_url)?;
        let client = reqwest::Client::builder().timeout(STORE_TIMEOUT).build()?;
        Ok(Self { base_url, client })
    }

    /// POST one record to `{base}/{index}/{doc_type}`.
    ///
    /// One document per call; a transport failure or non-2xx status is fatal
    /// for the whole run, the next scheduled run recovers.
    pub async fn publish(&self, index: &str, doc_type: &str, record: &Record) -> Result<()> {
        let url = self.base_url.join(&format!("{}/{}", index, doc_type))?;

        tracing::debug!("POST {} {:?}", url, record);

        let result = self.client.post(url).json(record).send().await?;

        if result.status().is_success() {
            Ok(())
        } else {
            Err(Error::WebServer(
                result.status().as_u16(),
                result.status().to_string(),
            ))
        }
    }

    /// Fetch the records of the last 24 hours matching `filter` from
    /// `{base}/{index}/_search`. Zero matches is a valid result.
    pub async fn search(&self, index: &str, filter: &Filter) -> Result<Vec<Record>> {
        let url = self.base_url.join(&format!("{}/_search", index))?;
        let query = filter.to_query();

        tracing::debug!("GET {} {}", url, query);

        let result = self.client.get(url).json(&query).send().await?;

        if result.status().is_success() {
            let envelope: SearchResponse = result.json().await?;
            Ok(envelope
                .hits
                .hits
                .into_iter()
                .map(|hit| hit.source)
                .collect())
        } else {
            Err(Error::WebServer(
                result.status().as_u16(),
                result.status().to_string(),
            ))
        }
    }
}

/// Result envelope of the store's `_search` endpoint.
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, serde::Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, serde::Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Record,
}

#[cfg(test)]
mod test {
    #[test]
    fn filter_query() {
        let filter = super::Filter::new()
            .term("_type", "hv")
            .term("cluster", "par1");

        assert_eq!(
            filter.to_query(),
            serde_json::json!({
                "query": {
                    "bool": {
                        "must": [
                            { "term": { "_type": "hv" } },
                            { "term": { "cluster": "par1" } }
                        ],
                        "filter": {
                            "range": {
                                "post_date": { "gt": "now-24h" }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn empty_filter_query() {
        let query = super::Filter::new().to_query();
        assert_eq!(query["query"]["bool"]["must"], serde_json::json!([]));
        assert_eq!(
            query["query"]["bool"]["filter"]["range"]["post_date"]["gt"],
            "now-24h"
        );
    }

    #[test]
    fn search_envelope() {
        let raw = serde_json::json!({
            "took": 2,
            "hits": {
                "total": 1,
                "hits": [
                    { "_index": "capacity", "_type": "hv", "_source": { "name": "hv01", "pCPU": 48 } }
                ]
            }
        });
        let envelope: super::SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.hits.hits.len(), 1);
        assert_eq!(envelope.hits.hits[0].source.name(), "hv01");
    }
}
