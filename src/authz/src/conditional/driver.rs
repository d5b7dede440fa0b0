//! Backend driver contract
//!
//! The gate only emits query text and reads back one boolean. Any backend
//! (a graph database, an HTTP policy service, an in-memory fake) plugs in by
//! implementing [`BackendDriver`] and [`Session`].

use super::error::{BackendError, BackendResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opens sessions against the backend that answers conditional queries
pub trait BackendDriver: Send + Sync {
    /// Open a session for one query
    fn open_session(&self) -> Box<dyn Session>;
}

/// A backend session executing composed query text
#[async_trait]
pub trait Session: Send {
    /// Run `query` and return its records
    async fn run(&mut self, query: &str) -> BackendResult<QueryResult>;
}

/// A single result record: field name → value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: serde_json::Map<String, Value>,
}

impl Record {
    /// Create a record from its fields
    pub fn new(fields: serde_json::Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Record with a single field
    pub fn single(key: impl Into<String>, value: Value) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert(key.into(), value);
        Self { fields }
    }

    /// Value of `key`, if present
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Records returned by one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub records: Vec<Record>,
}

impl QueryResult {
    /// Create a result from its records
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Boolean `field` of the first record
    pub fn first_bool(&self, field: &str) -> BackendResult<bool> {
        let record = self
            .records
            .first()
            .ok_or_else(|| BackendError::MalformedResponse("no records returned".to_string()))?;

        match record.get(field) {
            Some(Value::Bool(value)) => Ok(*value),
            Some(other) => Err(BackendError::MalformedResponse(format!(
                "field '{}' is not a boolean: {}",
                field, other
            ))),
            None => Err(BackendError::MalformedResponse(format!(
                "field '{}' missing from first record",
                field
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_bool() {
        let result = QueryResult::new(vec![
            Record::single("result", json!(true)),
            Record::single("result", json!(false)),
        ]);
        assert_eq!(result.first_bool("result"), Ok(true));
    }

    #[test]
    fn test_first_bool_malformed() {
        assert!(matches!(
            QueryResult::default().first_bool("result"),
            Err(BackendError::MalformedResponse(_))
        ));

        let wrong_type = QueryResult::new(vec![Record::single("result", json!("true"))]);
        assert!(wrong_type.first_bool("result").is_err());

        let missing = QueryResult::new(vec![Record::single("other", json!(true))]);
        assert!(missing.first_bool("result").is_err());
    }
}
