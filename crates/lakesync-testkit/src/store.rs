//! Scriptable in-memory table store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;

use lakesync_engine::store::TableStore;
use lakesync_types::config::WriteOperation;
use lakesync_types::error::StoreError;
use lakesync_types::record::PreparedRecord;
use lakesync_types::table::{
    CommitMetadata, Instant, InstantId, TableDescriptor, TableInit, TableType, Timeline,
    WriteError, WriteOutcome,
};

#[derive(Default)]
struct State {
    exists: bool,
    table_type: Option<TableType>,
    timeline: Vec<Instant>,
    commit_metadata: BTreeMap<InstantId, CommitMetadata>,
    visible: Vec<PreparedRecord>,
    pending: HashMap<InstantId, (WriteOperation, Vec<PreparedRecord>)>,
    rollbacks: Vec<InstantId>,
    compactions: Vec<InstantId>,
    seq: u64,
    start_commit_attempts: u32,
    fail_start_commits: u32,
    fail_commits: bool,
    fail_rollbacks: bool,
    fail_compaction: bool,
    error_keys: HashSet<String>,
}

/// In-memory [`TableStore`] test double.
///
/// Failure injection covers every error path the engine distinguishes:
/// transient commit-start races, per-key write errors, rejected commits,
/// failed rollbacks, and failed compaction scheduling.
pub struct MemoryTableStore {
    state: Mutex<State>,
}

impl MemoryTableStore {
    /// A store with no table initialized yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// A store with an initialized, empty table of the given type.
    #[must_use]
    pub fn with_table(table_type: TableType) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().expect("fresh lock");
            state.exists = true;
            state.table_type = Some(table_type);
        }
        store
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn lock_for_test(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }

    fn next_instant(state: &mut State) -> InstantId {
        state.seq += 1;
        InstantId::new(format!(
            "{}{:03}",
            Utc::now().format("%Y%m%d%H%M%S"),
            state.seq % 1000
        ))
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    /// Fail the next `n` `start_commit` calls with a transient
    /// invalid-state error.
    pub fn fail_next_start_commits(&self, n: u32) {
        self.lock_for_test().fail_start_commits = n;
    }

    /// Produce a write error for every record with this key.
    pub fn fail_writes_for_key(&self, key: impl Into<String>) {
        self.lock_for_test().error_keys.insert(key.into());
    }

    /// Report every commit as failed.
    pub fn fail_commits(&self) {
        self.lock_for_test().fail_commits = true;
    }

    /// Fail every rollback.
    pub fn fail_rollbacks(&self) {
        self.lock_for_test().fail_rollbacks = true;
    }

    /// Fail every compaction-scheduling call.
    pub fn fail_compaction_scheduling(&self) {
        self.lock_for_test().fail_compaction = true;
    }

    // ------------------------------------------------------------------
    // History fabrication
    // ------------------------------------------------------------------

    /// Append a completed commit carrying checkpoint metadata, as a prior
    /// sync round would have left it.
    pub fn push_commit_with_checkpoint(&self, resume: &str, reset: Option<&str>) {
        let mut state = self.lock_for_test();
        let id = Self::next_instant(&mut state);
        state
            .commit_metadata
            .insert(id.clone(), CommitMetadata::for_checkpoint(resume, reset));
        state.timeline.push(Instant::completed(id));
    }

    /// Append a completed commit with no checkpoint metadata, as a foreign
    /// writer would have left it.
    pub fn push_commit_without_checkpoint(&self) {
        let mut state = self.lock_for_test();
        let id = Self::next_instant(&mut state);
        state.commit_metadata.insert(id.clone(), CommitMetadata::new());
        state.timeline.push(Instant::completed(id));
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Records visible after all committed transactions.
    #[must_use]
    pub fn visible_records(&self) -> Vec<PreparedRecord> {
        self.lock_for_test().visible.clone()
    }

    /// Metadata of the last completed commit, if any.
    #[must_use]
    pub fn last_commit_metadata(&self) -> Option<CommitMetadata> {
        let state = self.lock_for_test();
        let last = state
            .timeline
            .iter()
            .rev()
            .find(|i| i.state == lakesync_types::table::InstantState::Completed)?;
        state.commit_metadata.get(&last.id).cloned()
    }

    /// Number of completed commits on the timeline.
    #[must_use]
    pub fn completed_commits(&self) -> usize {
        self.lock_for_test()
            .timeline
            .iter()
            .filter(|i| i.state == lakesync_types::table::InstantState::Completed)
            .count()
    }

    /// Number of rollbacks performed.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.lock_for_test().rollbacks.len()
    }

    /// Compactions scheduled so far.
    #[must_use]
    pub fn scheduled_compactions(&self) -> Vec<InstantId> {
        self.lock_for_test().compactions.clone()
    }

    /// Total `start_commit` calls, including failed ones.
    #[must_use]
    pub fn start_commit_attempts(&self) -> u32 {
        self.lock_for_test().start_commit_attempts
    }
}

impl Default for MemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for MemoryTableStore {
    fn metadata_exists(&self) -> Result<bool, StoreError> {
        Ok(self.locked()?.exists)
    }

    fn open_metadata(&self) -> Result<TableDescriptor, StoreError> {
        let state = self.locked()?;
        if !state.exists {
            return Err(StoreError::Backend("table does not exist".into()));
        }
        Ok(TableDescriptor {
            table_type: state
                .table_type
                .ok_or_else(|| StoreError::Backend("table type not set".into()))?,
            timeline: Timeline::new(state.timeline.clone()),
            commit_metadata: state.commit_metadata.clone(),
        })
    }

    fn init_table(&self, init: &TableInit) -> Result<(), StoreError> {
        let mut state = self.locked()?;
        state.exists = true;
        state.table_type = Some(init.table_type);
        Ok(())
    }

    fn start_commit(&self) -> Result<InstantId, StoreError> {
        let mut state = self.locked()?;
        state.start_commit_attempts += 1;
        if state.fail_start_commits > 0 {
            state.fail_start_commits -= 1;
            return Err(StoreError::InvalidState(
                "prior instant visible but not settled".into(),
            ));
        }
        let id = Self::next_instant(&mut state);
        state
            .pending
            .insert(id.clone(), (WriteOperation::Insert, Vec::new()));
        Ok(id)
    }

    fn write(
        &self,
        op: WriteOperation,
        records: &[PreparedRecord],
        instant: &InstantId,
    ) -> Result<WriteOutcome, StoreError> {
        let mut state = self.locked()?;
        if !state.pending.contains_key(instant) {
            return Err(StoreError::InvalidState(format!(
                "write for unknown instant {instant}"
            )));
        }

        let mut written = Vec::new();
        let mut errors = Vec::new();
        for record in records {
            if state.error_keys.contains(&record.key.key) {
                errors.push(WriteError {
                    key: record.key.key.clone(),
                    partition: record.key.partition.clone(),
                    message: "injected write failure".into(),
                });
            } else {
                written.push(record.clone());
            }
        }

        let outcome = WriteOutcome {
            total_records: records.len() as u64,
            error_records: errors.len() as u64,
            errors,
        };
        state.pending.insert(instant.clone(), (op, written));
        Ok(outcome)
    }

    fn commit(
        &self,
        instant: &InstantId,
        _outcome: &WriteOutcome,
        metadata: &CommitMetadata,
    ) -> Result<bool, StoreError> {
        let mut state = self.locked()?;
        if state.fail_commits {
            return Ok(false);
        }
        let (op, written) = state.pending.remove(instant).ok_or_else(|| {
            StoreError::InvalidState(format!("commit for unknown instant {instant}"))
        })?;

        match op {
            WriteOperation::Upsert => {
                for record in written {
                    if let Some(existing) =
                        state.visible.iter_mut().find(|r| r.key == record.key)
                    {
                        *existing = record;
                    } else {
                        state.visible.push(record);
                    }
                }
            }
            WriteOperation::Insert | WriteOperation::BulkInsert => {
                state.visible.extend(written);
            }
        }

        state
            .commit_metadata
            .insert(instant.clone(), metadata.clone());
        state.timeline.push(Instant::completed(instant.clone()));
        Ok(true)
    }

    fn rollback(&self, instant: &InstantId) -> Result<(), StoreError> {
        let mut state = self.locked()?;
        if state.fail_rollbacks {
            return Err(StoreError::Backend("injected rollback failure".into()));
        }
        state.pending.remove(instant).ok_or_else(|| {
            StoreError::InvalidState(format!("rollback for unknown instant {instant}"))
        })?;
        state.rollbacks.push(instant.clone());
        Ok(())
    }

    fn schedule_compaction(&self) -> Result<Option<InstantId>, StoreError> {
        let mut state = self.locked()?;
        if state.fail_compaction {
            return Err(StoreError::Backend(
                "injected compaction scheduling failure".into(),
            ));
        }
        let id = Self::next_instant(&mut state);
        let id = InstantId::new(format!("compaction-{id}"));
        state.compactions.push(id.clone());
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakesync_types::record::{OrderingValue, RecordKey};
    use serde_json::json;

    fn record(key: &str) -> PreparedRecord {
        PreparedRecord {
            key: RecordKey::unpartitioned(key),
            ordering: OrderingValue::Int { value: 1 },
            payload: json!({"id": key}),
        }
    }

    #[test]
    fn write_is_invisible_until_commit() {
        let store = MemoryTableStore::with_table(TableType::CopyOnWrite);
        let instant = store.start_commit().unwrap();
        let outcome = store
            .write(WriteOperation::Insert, &[record("a")], &instant)
            .unwrap();
        assert!(store.visible_records().is_empty());
        store
            .commit(&instant, &outcome, &CommitMetadata::for_checkpoint("ck1", None))
            .unwrap();
        assert_eq!(store.visible_records().len(), 1);
    }

    #[test]
    fn upsert_commit_replaces_by_key() {
        let store = MemoryTableStore::with_table(TableType::CopyOnWrite);

        let instant = store.start_commit().unwrap();
        let outcome = store
            .write(WriteOperation::Upsert, &[record("a")], &instant)
            .unwrap();
        store
            .commit(&instant, &outcome, &CommitMetadata::for_checkpoint("ck1", None))
            .unwrap();

        let mut updated = record("a");
        updated.payload = json!({"id": "a", "v": 2});
        let instant = store.start_commit().unwrap();
        let outcome = store
            .write(WriteOperation::Upsert, &[updated.clone()], &instant)
            .unwrap();
        store
            .commit(&instant, &outcome, &CommitMetadata::for_checkpoint("ck2", None))
            .unwrap();

        let visible = store.visible_records();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].payload, updated.payload);
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let store = MemoryTableStore::with_table(TableType::CopyOnWrite);
        let instant = store.start_commit().unwrap();
        store
            .write(WriteOperation::Insert, &[record("a")], &instant)
            .unwrap();
        store.rollback(&instant).unwrap();
        assert!(store.visible_records().is_empty());
        assert_eq!(store.rollback_count(), 1);
    }

    #[test]
    fn injected_start_commit_failures_are_transient() {
        let store = MemoryTableStore::with_table(TableType::CopyOnWrite);
        store.fail_next_start_commits(1);
        let err = store.start_commit().unwrap_err();
        assert!(err.is_transient());
        store.start_commit().unwrap();
        assert_eq!(store.start_commit_attempts(), 2);
    }

    #[test]
    fn instant_ids_are_monotonic() {
        let store = MemoryTableStore::with_table(TableType::CopyOnWrite);
        let a = store.start_commit().unwrap();
        let b = store.start_commit().unwrap();
        assert!(a < b);
    }
}
