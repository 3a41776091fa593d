//! Source reader and transformer traits.
//!
//! The source offers each batch in one of two record shapes: structured
//! rows (when a transform step will run) or generic records (written
//! as-is). The shape is chosen once per process from transformer presence
//! and never changes mid-pipeline.

use serde::{Deserialize, Serialize};

use lakesync_types::error::SyncError;
use lakesync_types::record::{Record, Row};

/// Schema describing a fetched batch or the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name.
    pub name: String,
    /// Schema document (field names and types), source-defined.
    pub document: serde_json::Value,
}

impl Schema {
    /// Build a schema from a name and document.
    #[must_use]
    pub fn new(name: impl Into<String>, document: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }
}

/// A checkpoint-delimited window of source data.
///
/// `batch` is `None` when the source had nothing to return; `checkpoint`
/// still marks the end of the (possibly empty) window. Created per round,
/// consumed entirely within it, never persisted.
#[derive(Debug, Clone)]
pub struct InputBatch<T> {
    pub batch: Option<Vec<T>>,
    pub checkpoint: Option<String>,
    pub schema: Option<Schema>,
}

impl<T> InputBatch<T> {
    /// Whether the batch carries zero records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Record shape a round reads in, selected once from transformer presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchShape {
    /// Structured rows, flowing through the transformer.
    Rows,
    /// Generic records, written as-is.
    Records,
}

/// Pulls bounded batches of new data from the external source.
pub trait SourceReader: Send {
    /// Fetch new data in structured-row shape.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Source`] on read failure.
    fn fetch_rows(
        &mut self,
        resume: Option<&str>,
        limit: u64,
    ) -> Result<InputBatch<Row>, SyncError>;

    /// Fetch new data in generic-record shape.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Source`] on read failure.
    fn fetch_records(
        &mut self,
        resume: Option<&str>,
        limit: u64,
    ) -> Result<InputBatch<Record>, SyncError>;
}

/// Maps a batch of rows to a new batch before key extraction.
pub trait Transformer: Send {
    /// Apply the transformation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Transform`] on failure.
    fn apply(&self, rows: Vec<Row>) -> Result<Vec<Row>, SyncError>;
}
