//! Key extraction strategies.
//!
//! Key extraction is polymorphic over source record shape: implementations
//! decide how to locate the entity key (and partition path) inside a
//! record. The default strategy reads configured dotted paths out of the
//! JSON document.

use lakesync_types::error::SyncError;
use lakesync_types::record::{Record, RecordKey};

/// Extracts the target-table key from a raw record.
pub trait KeyExtractor: Send + Sync {
    /// Extract the key for one record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Prepare`] when the record has no usable key.
    fn key(&self, record: &Record) -> Result<RecordKey, SyncError>;
}

/// Look up a dotted field path (e.g. `"meta.id"`) in a JSON record.
///
/// Returns `None` when any path segment is absent.
#[must_use]
pub fn nested_field<'a>(record: &'a Record, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn field_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Dotted-path key extractor: a required key field and an optional
/// partition field.
#[derive(Debug, Clone)]
pub struct SimpleKeyExtractor {
    key_field: String,
    partition_field: Option<String>,
}

impl SimpleKeyExtractor {
    /// Build an extractor for the given field paths.
    #[must_use]
    pub fn new(key_field: impl Into<String>, partition_field: Option<String>) -> Self {
        Self {
            key_field: key_field.into(),
            partition_field,
        }
    }
}

impl KeyExtractor for SimpleKeyExtractor {
    fn key(&self, record: &Record) -> Result<RecordKey, SyncError> {
        let key = nested_field(record, &self.key_field)
            .and_then(field_as_string)
            .ok_or_else(|| {
                SyncError::Prepare(format!(
                    "record has no value at key field '{}'",
                    self.key_field
                ))
            })?;

        // A missing partition value lands the record in the default
        // (empty) partition rather than failing the round.
        let partition = self
            .partition_field
            .as_deref()
            .and_then(|path| nested_field(record, path))
            .and_then(field_as_string)
            .unwrap_or_default();

        Ok(RecordKey { key, partition })
    }
}
