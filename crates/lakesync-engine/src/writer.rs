//! Write client and the write/commit protocol.
//!
//! The write client is a process-wide resource constructed at most once,
//! after the target schema is known, and explicitly closed on shutdown.
//! `write_and_commit` drives one transaction through the two-phase
//! protocol: start commit (with bounded retry), physical write, then
//! commit with checkpoint metadata attached or rollback on an exceeded
//! error budget.

use std::sync::Arc;

use lakesync_types::config::{SyncConfig, WriteOperation};
use lakesync_types::error::{StoreError, SyncError};
use lakesync_types::record::PreparedRecord;
use lakesync_types::table::{CommitMetadata, InstantId};

use crate::retry::{RetryPolicy, Sleeper};
use crate::source::Schema;
use crate::store::TableStore;

/// Per-record write errors logged before a rollback.
const MAX_LOGGED_ERRORS: usize = 100;

/// Validated write-client configuration, derived once from the user config
/// and the resolved schema. The user config is never mutated.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub table_path: String,
    pub table_name: String,
    /// Effective operation for the round (dedup demotes upsert to insert).
    pub operation: WriteOperation,
    pub filter_dupes: bool,
    pub commit_on_errors: bool,
    pub async_compaction: bool,
    /// Commit must be explicit; the write path never commits.
    pub auto_commit: bool,
    /// Pre-write combining of updates to the same key during upserts.
    pub combine_before_upsert: bool,
    /// Pre-write combining during inserts; tracks the dedup flag.
    pub combine_before_insert: bool,
    /// Inline (synchronous) compaction; must match the configured mode.
    pub inline_compaction: bool,
    pub schema: Schema,
}

impl WriterConfig {
    /// Derive a writer configuration from the sync config and schema.
    #[must_use]
    pub fn from_sync_config(cfg: &SyncConfig, schema: Schema) -> Self {
        Self {
            table_path: cfg.table_path.clone(),
            table_name: cfg.table_name.clone(),
            operation: cfg.effective_operation(),
            filter_dupes: cfg.filter_dupes,
            commit_on_errors: cfg.commit_on_errors,
            async_compaction: cfg.async_compaction,
            auto_commit: false,
            combine_before_upsert: true,
            combine_before_insert: cfg.filter_dupes,
            inline_compaction: cfg.inline_compaction_enabled(),
            schema,
        }
    }

    /// Check the construction invariants the sync protocol assumes.
    ///
    /// Violations are programming errors, not runtime input errors: they
    /// mean some override produced a write client the two-phase protocol
    /// cannot safely drive.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] naming the violated invariant.
    pub fn validate(&self, cfg: &SyncConfig) -> Result<(), SyncError> {
        if self.auto_commit {
            return Err(SyncError::Config(
                "auto-commit must be disabled; commit is an explicit second phase".into(),
            ));
        }
        if !self.combine_before_upsert {
            return Err(SyncError::Config(
                "combine-before-upsert must be enabled".into(),
            ));
        }
        if self.combine_before_insert != cfg.filter_dupes {
            return Err(SyncError::Config(format!(
                "combine-before-insert ({}) must track the dedup flag ({})",
                self.combine_before_insert, cfg.filter_dupes
            )));
        }
        if self.inline_compaction != cfg.inline_compaction_enabled() {
            return Err(SyncError::Config(format!(
                "inline-compaction flag ({}) must match the configured mode ({})",
                self.inline_compaction,
                cfg.inline_compaction_enabled()
            )));
        }
        Ok(())
    }
}

/// Owns the table-store write handle for the process lifetime.
pub struct WriteClient {
    store: Arc<dyn TableStore>,
    config: WriterConfig,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper + Send + Sync>,
    closed: bool,
}

impl WriteClient {
    /// Construct and validate the write client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when a construction invariant is
    /// violated.
    pub fn new(
        store: Arc<dyn TableStore>,
        config: WriterConfig,
        sync_config: &SyncConfig,
        sleeper: Arc<dyn Sleeper + Send + Sync>,
    ) -> Result<Self, SyncError> {
        config.validate(sync_config)?;
        tracing::info!(
            table = config.table_name,
            operation = %config.operation,
            schema = config.schema.name,
            "Setting up write client"
        );
        Ok(Self {
            store,
            config,
            retry: RetryPolicy::commit_start(),
            sleeper,
            closed: false,
        })
    }

    /// The validated configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Request a new transaction id, retrying transient invalid-state races.
    fn start_commit(&self) -> Result<InstantId, SyncError> {
        self.retry
            .run(
                self.sleeper.as_ref(),
                || self.store.start_commit(),
                StoreError::is_transient,
            )
            .map_err(|err| {
                if err.is_transient() {
                    SyncError::CommitStartExhausted {
                        attempts: self.retry.max_attempts(),
                        source: err,
                    }
                } else {
                    SyncError::Store(err)
                }
            })
    }

    /// Write one batch and drive it to commit or rollback.
    ///
    /// On a successful commit with async compaction enabled, requests that
    /// the store schedule a compaction and returns its instant. A failed
    /// scheduling call is logged and swallowed; the commit already
    /// succeeded and must stay visible.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WriteErrors`] after rolling back when the error
    /// budget is exceeded, [`SyncError::RollbackFailed`] when that rollback
    /// itself fails, [`SyncError::CommitFailed`] when the store rejects the
    /// commit, and [`SyncError::CommitStartExhausted`] when commit
    /// initiation keeps racing.
    pub fn write_and_commit(
        &self,
        records: &[PreparedRecord],
        checkpoint: &str,
        reset_checkpoint: Option<&str>,
    ) -> Result<Option<InstantId>, SyncError> {
        let instant = self.start_commit()?;
        tracing::info!(instant = %instant, records = records.len(), "Starting commit");

        let outcome = self
            .store
            .write(self.config.operation, records, &instant)?;

        if !outcome.has_errors() || self.config.commit_on_errors {
            let metadata = CommitMetadata::for_checkpoint(checkpoint, reset_checkpoint);

            if outcome.has_errors() {
                tracing::warn!(
                    instant = %instant,
                    error_records = outcome.error_records,
                    total_records = outcome.total_records,
                    "Some records failed to write but committing anyway since \
                     commit-on-errors is set"
                );
            }

            let success = self.store.commit(&instant, &outcome, &metadata)?;
            if !success {
                tracing::error!(instant = %instant, "Commit failed");
                return Err(SyncError::CommitFailed { instant });
            }
            tracing::info!(instant = %instant, checkpoint, "Commit successful");

            let mut scheduled = None;
            if self.config.async_compaction {
                match self.store.schedule_compaction() {
                    Ok(compaction) => scheduled = compaction,
                    Err(err) => {
                        // The commit is already durable; a failed scheduling
                        // call only delays maintenance until the next round.
                        tracing::warn!(
                            instant = %instant,
                            error = %err,
                            "Failed to schedule compaction after commit"
                        );
                    }
                }
            }
            Ok(scheduled)
        } else {
            tracing::error!(
                instant = %instant,
                error_records = outcome.error_records,
                total_records = outcome.total_records,
                "Write produced error records; rolling back"
            );
            for write_error in outcome.errors.iter().take(MAX_LOGGED_ERRORS) {
                tracing::error!(
                    key = write_error.key,
                    partition = write_error.partition,
                    "Write error for record: {}",
                    write_error.message
                );
            }

            self.store
                .rollback(&instant)
                .map_err(|source| SyncError::RollbackFailed {
                    instant: instant.clone(),
                    source,
                })?;
            tracing::warn!(instant = %instant, "Rolled back failed write");

            Err(SyncError::WriteErrors {
                instant,
                error_records: outcome.error_records,
                total_records: outcome.total_records,
            })
        }
    }

    /// Release all held transactional resources. Safe to call repeatedly.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::info!(table = self.config.table_name, "Closing write client");
            self.closed = true;
        }
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakesync_testkit::MemoryTableStore;
    use lakesync_types::record::{OrderingValue, RecordKey};
    use lakesync_types::table::TableType;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    struct NoopSleeper;
    impl Sleeper for NoopSleeper {
        fn sleep(&self, _: Duration) {}
    }

    fn sync_config() -> SyncConfig {
        serde_json::from_value(json!({
            "table_path": "/data/events",
            "table_name": "events",
            "table_type": "copy_on_write",
            "operation": "upsert",
            "key_field": "id",
            "ordering_field": "ts",
        }))
        .unwrap()
    }

    fn schema() -> Schema {
        Schema::new("events", json!({"fields": []}))
    }

    fn client(store: Arc<MemoryTableStore>, cfg: &SyncConfig) -> WriteClient {
        let writer_cfg = WriterConfig::from_sync_config(cfg, schema());
        WriteClient::new(store, writer_cfg, cfg, Arc::new(NoopSleeper)).unwrap()
    }

    fn record(key: &str, ordering: i64) -> PreparedRecord {
        PreparedRecord {
            key: RecordKey::unpartitioned(key),
            ordering: OrderingValue::Int { value: ordering },
            payload: json!({"id": key, "ts": ordering}),
        }
    }

    #[test]
    fn derived_config_passes_validation() {
        let cfg = sync_config();
        let writer_cfg = WriterConfig::from_sync_config(&cfg, schema());
        assert!(writer_cfg.validate(&cfg).is_ok());
        assert!(!writer_cfg.auto_commit);
        assert!(writer_cfg.combine_before_upsert);
    }

    #[test]
    fn auto_commit_violation_is_config_error() {
        let cfg = sync_config();
        let mut writer_cfg = WriterConfig::from_sync_config(&cfg, schema());
        writer_cfg.auto_commit = true;
        let err = writer_cfg.validate(&cfg).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("auto-commit"));
    }

    #[test]
    fn combine_before_insert_must_track_dedup_flag() {
        let mut cfg = sync_config();
        cfg.filter_dupes = true;
        let mut writer_cfg = WriterConfig::from_sync_config(&cfg, schema());
        writer_cfg.combine_before_insert = false;
        assert!(writer_cfg.validate(&cfg).is_err());
    }

    #[test]
    fn inline_compaction_must_match_mode() {
        let mut cfg = sync_config();
        cfg.table_type = TableType::MergeOnRead;
        let mut writer_cfg = WriterConfig::from_sync_config(&cfg, schema());
        writer_cfg.inline_compaction = false;
        assert!(writer_cfg.validate(&cfg).is_err());
    }

    #[test]
    fn commit_embeds_checkpoint_metadata() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        let scheduled = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap();
        assert!(scheduled.is_none());

        let meta = store.last_commit_metadata().unwrap();
        assert_eq!(meta.resume_checkpoint(), Some("ck1"));
        assert!(meta.reset_checkpoint().is_none());
        assert_eq!(store.visible_records().len(), 1);
    }

    #[test]
    fn reset_marker_recorded_when_override_used() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        client
            .write_and_commit(&[record("a", 1)], "ck2", Some("ck2"))
            .unwrap();
        let meta = store.last_commit_metadata().unwrap();
        assert_eq!(meta.reset_checkpoint(), Some("ck2"));
    }

    #[test]
    fn error_budget_exceeded_rolls_back() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_writes_for_key("b");
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        let err = client
            .write_and_commit(&[record("a", 1), record("b", 2)], "ck1", None)
            .unwrap_err();
        assert!(matches!(err, SyncError::WriteErrors { .. }));
        assert_eq!(store.rollback_count(), 1);
        // Pre-round visible state restored: nothing committed.
        assert!(store.visible_records().is_empty());
        assert!(store.last_commit_metadata().is_none());
    }

    #[test]
    fn commit_on_errors_commits_with_warning() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_writes_for_key("b");
        let mut cfg = sync_config();
        cfg.commit_on_errors = true;
        let client = client(store.clone(), &cfg);

        client
            .write_and_commit(&[record("a", 1), record("b", 2)], "ck1", None)
            .unwrap();
        assert_eq!(store.rollback_count(), 0);
        assert_eq!(store.visible_records().len(), 1);
    }

    #[test]
    fn rollback_failure_is_fatal_and_carries_instant() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_writes_for_key("a");
        store.fail_rollbacks();
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        let err = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap_err();
        assert!(matches!(err, SyncError::RollbackFailed { .. }));
    }

    #[test]
    fn failed_commit_is_fatal() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_commits();
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        let err = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap_err();
        assert!(matches!(err, SyncError::CommitFailed { .. }));
    }

    #[test]
    fn commit_start_retries_transient_races() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_next_start_commits(2);
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        // Two transient failures, third attempt succeeds.
        client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap();
        assert_eq!(store.start_commit_attempts(), 3);
    }

    #[test]
    fn commit_start_exhaustion_is_fatal() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_next_start_commits(5);
        let cfg = sync_config();
        let client = client(store.clone(), &cfg);

        let err = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap_err();
        match err {
            SyncError::CommitStartExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.start_commit_attempts(), 3);
    }

    #[test]
    fn async_compaction_scheduled_after_commit() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::MergeOnRead));
        let mut cfg = sync_config();
        cfg.table_type = TableType::MergeOnRead;
        cfg.async_compaction = true;
        cfg.continuous_mode = true;
        let client = client(store.clone(), &cfg);

        let scheduled = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap();
        assert!(scheduled.is_some());
        assert_eq!(store.scheduled_compactions().len(), 1);
    }

    #[test]
    fn compaction_scheduling_failure_does_not_fail_round() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::MergeOnRead));
        store.fail_compaction_scheduling();
        let mut cfg = sync_config();
        cfg.table_type = TableType::MergeOnRead;
        cfg.async_compaction = true;
        cfg.continuous_mode = true;
        let client = client(store.clone(), &cfg);

        let scheduled = client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap();
        assert!(scheduled.is_none());
        // The commit itself stayed visible.
        assert_eq!(store.visible_records().len(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        let cfg = sync_config();
        let mut client = client(store, &cfg);
        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());
    }

    #[test]
    fn retry_sleeps_are_observable() {
        struct Recorder(Mutex<Vec<Duration>>);
        impl Sleeper for Recorder {
            fn sleep(&self, d: Duration) {
                self.0.lock().unwrap().push(d);
            }
        }

        let store = Arc::new(MemoryTableStore::with_table(TableType::CopyOnWrite));
        store.fail_next_start_commits(1);
        let cfg = sync_config();
        let sleeper = Arc::new(Recorder(Mutex::new(Vec::new())));
        let writer_cfg = WriterConfig::from_sync_config(&cfg, schema());
        let client = WriteClient::new(store, writer_cfg, &cfg, sleeper.clone()).unwrap();

        client
            .write_and_commit(&[record("a", 1)], "ck1", None)
            .unwrap();
        assert_eq!(*sleeper.0.lock().unwrap(), vec![Duration::from_secs(1)]);
    }
}
