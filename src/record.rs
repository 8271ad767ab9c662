//! The unit of data flowing through every pipeline stage.
//!
//! A [`Record`] is value-like: stages that need to change one must build a
//! new record rather than mutate a forwarded one. The core never deduplicates
//! records; two records with the same id are distinct items.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single data record moving through a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque identifier. May be empty; carries no uniqueness guarantee.
    pub id: String,
    /// Named fields with arbitrary typed values.
    pub data: BTreeMap<String, Value>,
    /// Provenance tags and other string annotations.
    pub metadata: HashMap<String, String>,
    /// Event or ingestion time, epoch seconds.
    pub timestamp: i64,
}

impl Record {
    /// Creates an empty record with the given id, stamped with the current time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: BTreeMap::new(),
            metadata: HashMap::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Adds a data field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Overrides the timestamp (epoch seconds).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns a data field, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_populates_fields() {
        let record = Record::new("r-1")
            .with_field("level", "info")
            .with_field("count", 3)
            .with_metadata("origin", "unit-test")
            .with_timestamp(1_700_000_000);

        assert_eq!(record.id, "r-1");
        assert_eq!(record.field("level"), Some(&Value::from("info")));
        assert_eq!(record.field("count"), Some(&Value::from(3)));
        assert_eq!(record.metadata.get("origin").map(String::as_str), Some("unit-test"));
        assert_eq!(record.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_empty_id_is_allowed() {
        let record = Record::new("");
        assert!(record.id.is_empty());
        assert!(record.data.is_empty());
        assert!(record.timestamp > 0);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let record = Record::new("r-2").with_field("payload", serde_json::json!({"a": [1, 2]}));
        let serialized = serde_json::to_string(&record).expect("record should serialize");
        let deserialized: Record =
            serde_json::from_str(&serialized).expect("record should deserialize");
        assert_eq!(record, deserialized);
    }
}
