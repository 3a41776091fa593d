//! Sync configuration types.
//!
//! `SyncConfig` is the user-supplied configuration for one table sync. It
//! is never mutated after load; per-round derived values (the effective
//! write operation, the inline-compaction flag) are computed on demand.

use serde::{Deserialize, Serialize};

use crate::table::TableType;

/// Physical write mode for a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    /// Insert without merging against existing keyed data.
    Insert,
    /// Merge against existing keys; conflicting updates resolved by
    /// ordering value.
    Upsert,
    /// Sorted bulk load path for initial backfills.
    BulkInsert,
}

impl WriteOperation {
    /// Wire-format string for logs and metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
            Self::BulkInsert => "bulk_insert",
        }
    }
}

impl std::fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog sync settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncConfig {
    /// Whether to publish table metadata to the external catalog after a
    /// successful non-empty commit.
    #[serde(default)]
    pub enabled: bool,
    /// Table name in the catalog; defaults to the sync table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
}

fn default_source_limit() -> u64 {
    u64::MAX
}

/// Configuration for syncing one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base path of the target table.
    pub table_path: String,
    /// Logical table name.
    pub table_name: String,
    /// Storage layout of the target table.
    pub table_type: TableType,
    /// Configured write operation. The effective operation for a round may
    /// differ; see [`SyncConfig::effective_operation`].
    pub operation: WriteOperation,
    /// User-supplied checkpoint override ("re-read from here").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    /// Upper bound on records fetched per round.
    #[serde(default = "default_source_limit")]
    pub source_limit: u64,
    /// Dotted path of the record-key field in source records.
    pub key_field: String,
    /// Dotted path of the partition field; unpartitioned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_field: Option<String>,
    /// Dotted path of the ordering field used to break ties between
    /// conflicting updates to the same key.
    pub ordering_field: String,
    /// Collapse duplicate keys within a batch before writing.
    #[serde(default)]
    pub filter_dupes: bool,
    /// Commit even when some records failed to write.
    #[serde(default)]
    pub commit_on_errors: bool,
    /// Schedule an asynchronous compaction after each successful commit.
    #[serde(default)]
    pub async_compaction: bool,
    /// Continuous (long-running scheduler) mode; disables inline compaction.
    #[serde(default)]
    pub continuous_mode: bool,
    /// Static target schema; when absent the schema is fixed from the
    /// first fetched batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<crate::record::Record>,
    /// Catalog sync settings.
    #[serde(default)]
    pub catalog_sync: CatalogSyncConfig,
}

impl SyncConfig {
    /// The operation actually used for a round.
    ///
    /// Dedup and merge-on-write are mutually exclusive conflict-resolution
    /// policies: with `filter_dupes` set, upserts are demoted to inserts and
    /// the dedup filter is the sole tie-breaker. The user config itself is
    /// never mutated.
    #[must_use]
    pub fn effective_operation(&self) -> WriteOperation {
        if self.filter_dupes && self.operation == WriteOperation::Upsert {
            WriteOperation::Insert
        } else {
            self.operation
        }
    }

    /// Whether inline (synchronous) compaction is enabled.
    ///
    /// Inline compaction only applies to merge-on-read tables and is
    /// disabled in continuous mode, where compaction runs asynchronously.
    #[must_use]
    pub fn inline_compaction_enabled(&self) -> bool {
        self.table_type == TableType::MergeOnRead && !self.continuous_mode
    }

    /// Table name to publish to the catalog.
    #[must_use]
    pub fn catalog_table_name(&self) -> &str {
        self.catalog_sync
            .table_name
            .as_deref()
            .unwrap_or(&self.table_name)
    }
}
