//! Table store trait definition.
//!
//! [`TableStore`] is the contract the transactional table engine fulfils:
//! metadata access, the two-phase write/commit protocol, rollback, and
//! compaction scheduling. The physical storage format, index structure,
//! and compaction algorithm all live behind this trait.

use lakesync_types::record::PreparedRecord;
use lakesync_types::config::WriteOperation;
use lakesync_types::error::StoreError;
use lakesync_types::table::{
    CommitMetadata, InstantId, TableDescriptor, TableInit, WriteOutcome,
};

/// Storage contract for the target table.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn TableStore>`.
pub trait TableStore: Send + Sync {
    /// Whether the table metadata shell exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn metadata_exists(&self) -> Result<bool, StoreError>;

    /// Open the table's metadata: type, timeline, and per-instant commit
    /// metadata. Fails if the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn open_metadata(&self) -> Result<TableDescriptor, StoreError>;

    /// Initialize the on-disk/catalog table shell.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn init_table(&self, init: &TableInit) -> Result<(), StoreError>;

    /// Request a new transaction identifier.
    ///
    /// May fail with [`StoreError::InvalidState`] transiently when racing
    /// an externally-visible but not-yet-settled prior instant; callers
    /// retry that class only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn start_commit(&self) -> Result<InstantId, StoreError>;

    /// Dispatch records to the physical write path for `op`.
    ///
    /// Produces per-record outcomes without making them visible; commit is
    /// a separate step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn write(
        &self,
        op: WriteOperation,
        records: &[PreparedRecord],
        instant: &InstantId,
    ) -> Result<WriteOutcome, StoreError>;

    /// Commit a started transaction with the given metadata attached.
    ///
    /// Returns `false` when the store reports the commit as failed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn commit(
        &self,
        instant: &InstantId,
        outcome: &WriteOutcome,
        metadata: &CommitMetadata,
    ) -> Result<bool, StoreError>;

    /// Roll back a started transaction, restoring the pre-round visible
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn rollback(&self, instant: &InstantId) -> Result<(), StoreError>;

    /// Schedule (not execute) a maintenance compaction.
    ///
    /// Returns the scheduled compaction's instant, or `None` when the
    /// store decided no compaction is needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn schedule_compaction(&self) -> Result<Option<InstantId>, StoreError>;
}
