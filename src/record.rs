//!
//! Flat metric documents.
//!

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One flat field → value document, the unit of everything published to and
/// read back from the store.
///
/// Every record carries `name` (the entity identifier) and `post_date`
/// (ISO-8601, stamped at construction). Scope tags — `host`, `cluster`,
/// `datacenter` — are added by whoever builds the record. Records are
/// assembled once per collection cycle and handed to the store untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: serde_json::Map<String, Value>,
}

impl Record {
    /// Create a record for `name`, stamped with `post_date`.
    #[must_use]
    pub fn new(name: &str, post_date: chrono::DateTime<chrono::Utc>) -> Self {
        let mut record = Self {
            fields: serde_json::Map::new(),
        };
        record.set("name", name);
        record.set("post_date", post_date.to_rfc3339());
        record
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Numeric value of a field. Missing or non-numeric fields read as 0.0,
    /// the degraded default for optional values.
    #[must_use]
    pub fn number(&self, field: &str) -> f64 {
        self.fields.get(field).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// String value of a field, if present.
    #[must_use]
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// The entity identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        self.text("name").unwrap_or("")
    }

    /// Iterate over fields and values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}
