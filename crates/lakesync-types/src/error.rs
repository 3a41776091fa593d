//! Typed errors for the sync core and the table-store collaborator.

use crate::table::InstantId;

/// Errors surfaced by [`TableStore`](../../lakesync_engine/store/trait.TableStore.html)
/// implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store observed an instant in a state that forbids the requested
    /// transition, typically a race against an externally-visible but
    /// not-yet-settled prior instant. The only transient class: commit
    /// initiation retries on it.
    #[error("invalid store state: {0}")]
    InvalidState(String),

    /// File-system or network I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether commit initiation may retry after this error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

/// Fatal and control-flow errors of a sync round.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration or invariant violation detected at write-client
    /// construction. Programming-error class; never retried.
    #[error("invalid writer configuration: {0}")]
    Config(String),

    /// The table has commit history but its last commit carries no resume
    /// checkpoint. The table was not built by this sync process; resuming
    /// would silently replay or skip data.
    #[error(
        "unable to find previous checkpoint; verify this table was built by \
         lakesync. last instant: {last_instant}, instants: [{instants}], \
         commit metadata: {metadata}"
    )]
    CheckpointInconsistency {
        last_instant: InstantId,
        instants: String,
        metadata: String,
    },

    /// Commit initiation kept failing transiently after all retries.
    #[error("failed to start commit after {attempts} attempts: {source}")]
    CommitStartExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// Records failed to write and the policy forbids committing with
    /// errors. The started transaction was rolled back.
    #[error(
        "write produced {error_records} error records out of {total_records}; \
         instant {instant} rolled back"
    )]
    WriteErrors {
        instant: InstantId,
        error_records: u64,
        total_records: u64,
    },

    /// The store reported a failed commit.
    #[error("commit {instant} failed")]
    CommitFailed { instant: InstantId },

    /// Rollback of a started transaction failed. Propagated rather than
    /// masking the write failure that triggered the rollback.
    #[error("rollback of instant {instant} failed: {source}")]
    RollbackFailed {
        instant: InstantId,
        #[source]
        source: StoreError,
    },

    /// The table on disk is not the type the configuration expects.
    #[error("table type mismatch: configured {expected} but store reports {actual}")]
    TableTypeMismatch {
        expected: crate::table::TableType,
        actual: crate::table::TableType,
    },

    /// Table-store failure outside the commit protocol.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Source read failure.
    #[error("source read failed: {0}")]
    Source(String),

    /// Transform step failure.
    #[error("transform failed: {0}")]
    Transform(String),

    /// Record preparation (key extraction) failure.
    #[error("record preparation failed: {0}")]
    Prepare(String),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, SyncError>;
