//! Sync-round core for the lakesync incremental table sync engine.
//!
//! One [`SyncRound::run_once`](round::SyncRound::run_once) call performs a
//! full round: resolve the resume checkpoint from the table's commit
//! history, pull one batch from the source, optionally transform it,
//! extract keys and ordering values, and write it transactionally with the
//! checkpoint embedded in the commit metadata.

pub mod catalog;
pub mod config;
pub mod keygen;
pub mod logging;
pub mod prepare;
pub mod resolver;
pub mod retry;
pub mod round;
pub mod source;
pub mod store;
pub mod writer;

// Re-export public API for convenience
pub use round::{RoundCollaborators, SyncRound};
pub use store::TableStore;
pub use writer::WriteClient;

// The dev-dependency cycle with `lakesync-testkit` means the testkit
// doubles implement the collaborator traits of the separately compiled
// `lakesync_engine` lib, which rustc treats as distinct from this
// `--cfg test` build's traits. These forwarding impls bridge the two so
// unit tests can hand the doubles to this build's APIs unchanged.
#[cfg(test)]
mod testkit_compat {
    use lakesync_engine as lib;
    use lakesync_testkit::{MemoryTableStore, RecordingCatalog, ScriptedSource};
    use lakesync_types::config::WriteOperation;
    use lakesync_types::error::{StoreError, SyncError};
    use lakesync_types::record::{PreparedRecord, Record, Row};
    use lakesync_types::table::{
        CommitMetadata, InstantId, TableDescriptor, TableInit, WriteOutcome,
    };

    use crate::catalog::{CatalogSync, CatalogTableInfo};
    use crate::source::{InputBatch, Schema, SourceReader};
    use crate::store::TableStore;

    fn schema_from_lib(schema: lib::source::Schema) -> Schema {
        Schema {
            name: schema.name,
            document: schema.document,
        }
    }

    fn batch_from_lib<T>(batch: lib::source::InputBatch<T>) -> InputBatch<T> {
        InputBatch {
            batch: batch.batch,
            checkpoint: batch.checkpoint,
            schema: batch.schema.map(schema_from_lib),
        }
    }

    impl TableStore for MemoryTableStore {
        fn metadata_exists(&self) -> Result<bool, StoreError> {
            lib::store::TableStore::metadata_exists(self)
        }

        fn open_metadata(&self) -> Result<TableDescriptor, StoreError> {
            lib::store::TableStore::open_metadata(self)
        }

        fn init_table(&self, init: &TableInit) -> Result<(), StoreError> {
            lib::store::TableStore::init_table(self, init)
        }

        fn start_commit(&self) -> Result<InstantId, StoreError> {
            lib::store::TableStore::start_commit(self)
        }

        fn write(
            &self,
            op: WriteOperation,
            records: &[PreparedRecord],
            instant: &InstantId,
        ) -> Result<WriteOutcome, StoreError> {
            lib::store::TableStore::write(self, op, records, instant)
        }

        fn commit(
            &self,
            instant: &InstantId,
            outcome: &WriteOutcome,
            metadata: &CommitMetadata,
        ) -> Result<bool, StoreError> {
            lib::store::TableStore::commit(self, instant, outcome, metadata)
        }

        fn rollback(&self, instant: &InstantId) -> Result<(), StoreError> {
            lib::store::TableStore::rollback(self, instant)
        }

        fn schedule_compaction(&self) -> Result<Option<InstantId>, StoreError> {
            lib::store::TableStore::schedule_compaction(self)
        }
    }

    impl SourceReader for ScriptedSource {
        fn fetch_rows(
            &mut self,
            resume: Option<&str>,
            limit: u64,
        ) -> Result<InputBatch<Row>, SyncError> {
            lib::source::SourceReader::fetch_rows(self, resume, limit).map(batch_from_lib)
        }

        fn fetch_records(
            &mut self,
            resume: Option<&str>,
            limit: u64,
        ) -> Result<InputBatch<Record>, SyncError> {
            lib::source::SourceReader::fetch_records(self, resume, limit).map(batch_from_lib)
        }
    }

    impl CatalogSync for RecordingCatalog {
        fn sync_table(&self, info: &CatalogTableInfo) -> anyhow::Result<()> {
            let info = lib::catalog::CatalogTableInfo {
                table_name: info.table_name.clone(),
                table_path: info.table_path.clone(),
                schema: info.schema.clone().map(|s| lib::source::Schema {
                    name: s.name,
                    document: s.document,
                }),
                partition_fields: info.partition_fields.clone(),
            };
            lib::catalog::CatalogSync::sync_table(self, &info)
        }
    }
}
