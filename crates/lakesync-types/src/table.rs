//! Table timeline, commit metadata, and write outcome types.
//!
//! These model the read-only view of the transactional table store that the
//! sync engine needs: an ordered timeline of instants, the string metadata
//! attached to each completed commit, and the per-write outcome used for
//! the commit/rollback decision. The physical store owns all of this; the
//! engine only reads it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{CHECKPOINT_KEY, CHECKPOINT_RESET_KEY};

/// Storage layout of the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    /// Rewrites base files on every commit; reads the commit timeline.
    CopyOnWrite,
    /// Appends row-level deltas; reads the delta-commit timeline and relies
    /// on compaction to fold deltas into base storage.
    MergeOnRead,
}

impl TableType {
    /// Wire-format string for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CopyOnWrite => "copy_on_write",
            Self::MergeOnRead => "merge_on_read",
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a single transaction on the table timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstantId(String);

impl InstantId {
    /// Create a new instant identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for InstantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InstantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle state of an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstantState {
    Requested,
    Inflight,
    Completed,
}

/// One timestamped transaction record on the table's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instant {
    pub id: InstantId,
    pub state: InstantState,
}

impl Instant {
    /// A completed instant.
    #[must_use]
    pub fn completed(id: impl Into<InstantId>) -> Self {
        Self {
            id: id.into(),
            state: InstantState::Completed,
        }
    }
}

/// String metadata attached to a completed commit.
///
/// Carries the two reserved checkpoint keys alongside anything else the
/// store or other writers recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitMetadata(BTreeMap<String, String>);

impl CommitMetadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build commit metadata carrying checkpoint state: the resume token,
    /// and the reset marker only when an override was actively used.
    #[must_use]
    pub fn for_checkpoint(resume: &str, reset: Option<&str>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(CHECKPOINT_KEY.to_string(), resume.to_string());
        if let Some(reset) = reset {
            map.insert(CHECKPOINT_RESET_KEY.to_string(), reset.to_string());
        }
        Self(map)
    }

    /// Look up an arbitrary metadata value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a metadata value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The resume checkpoint recorded on this commit, if any.
    #[must_use]
    pub fn resume_checkpoint(&self) -> Option<&str> {
        self.get(CHECKPOINT_KEY)
    }

    /// The reset marker recorded on this commit, if any.
    #[must_use]
    pub fn reset_checkpoint(&self) -> Option<&str> {
        self.get(CHECKPOINT_RESET_KEY)
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Ordered timeline of instants for one table.
///
/// Checkpoint resolution only ever looks at completed instants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub instants: Vec<Instant>,
}

impl Timeline {
    /// Timeline from an ordered instant list.
    #[must_use]
    pub fn new(instants: Vec<Instant>) -> Self {
        Self { instants }
    }

    /// The last completed instant, if any.
    #[must_use]
    pub fn last_completed(&self) -> Option<&Instant> {
        self.instants
            .iter()
            .rev()
            .find(|i| i.state == InstantState::Completed)
    }

    /// All completed instants in timeline order.
    #[must_use]
    pub fn completed(&self) -> Vec<&Instant> {
        self.instants
            .iter()
            .filter(|i| i.state == InstantState::Completed)
            .collect()
    }
}

/// Snapshot of a table's metadata as opened from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_type: TableType,
    pub timeline: Timeline,
    /// Commit metadata per completed instant id.
    pub commit_metadata: BTreeMap<InstantId, CommitMetadata>,
}

impl TableDescriptor {
    /// Metadata of the given instant, empty if the store recorded none.
    #[must_use]
    pub fn metadata_for(&self, instant: &InstantId) -> CommitMetadata {
        self.commit_metadata.get(instant).cloned().unwrap_or_default()
    }
}

/// Parameters for initializing a new table shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInit {
    pub table_type: TableType,
    pub table_name: String,
}

/// Per-record failure detail from a physical write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteError {
    pub key: String,
    #[serde(default)]
    pub partition: String,
    pub message: String,
}

/// Aggregate result of one physical write, consumed to decide commit vs
/// rollback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub total_records: u64,
    pub error_records: u64,
    /// Per-record error detail; may be truncated by the store.
    #[serde(default)]
    pub errors: Vec<WriteError>,
}

impl WriteOutcome {
    /// Outcome of a clean write.
    #[must_use]
    pub fn success(total_records: u64) -> Self {
        Self {
            total_records,
            error_records: 0,
            errors: Vec::new(),
        }
    }

    /// Whether any record failed to write.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_records > 0
    }
}
