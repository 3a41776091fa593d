//! The sync-round driver.
//!
//! Composes checkpoint resolution, the read/transform/prepare pipeline,
//! the write coordinator, and the catalog trigger into one atomic round.
//! Rounds are invoked serially by an external scheduler; no two rounds of
//! the same table run concurrently.

use std::sync::Arc;

use lakesync_types::config::SyncConfig;
use lakesync_types::error::SyncError;
use lakesync_types::record::{PreparedRecord, Record};
use lakesync_types::table::InstantId;

use crate::catalog::{self, CatalogSync};
use crate::keygen::{KeyExtractor, SimpleKeyExtractor};
use crate::prepare::{dedup_records, prepare_records};
use crate::resolver;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::source::{FetchShape, Schema, SourceReader, Transformer};
use crate::store::TableStore;
use crate::writer::{WriteClient, WriterConfig};

/// External collaborators wired into a [`SyncRound`].
pub struct RoundCollaborators {
    pub store: Arc<dyn TableStore>,
    pub source: Box<dyn SourceReader>,
    pub transformer: Option<Box<dyn Transformer>>,
    pub key_extractor: Option<Arc<dyn KeyExtractor>>,
    pub catalog: Option<Arc<dyn CatalogSync>>,
    pub sleeper: Arc<dyn Sleeper + Send + Sync>,
}

impl RoundCollaborators {
    /// Collaborator set with defaults: no transformer, dotted-path key
    /// extraction from the config, no catalog, thread sleeps.
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, source: Box<dyn SourceReader>) -> Self {
        Self {
            store,
            source,
            transformer: None,
            key_extractor: None,
            catalog: None,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Transform each batch before key extraction. Also switches the
    /// source read to structured-row shape.
    #[must_use]
    pub fn with_transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Replace the default dotted-path key extractor.
    #[must_use]
    pub fn with_key_extractor(mut self, extractor: Arc<dyn KeyExtractor>) -> Self {
        self.key_extractor = Some(extractor);
        self
    }

    /// Publish to this catalog after successful non-empty commits.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSync>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Replace the blocking sleeper used for commit-start retries.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper + Send + Sync>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

/// One batch read from the source, normalized to generic records.
struct FetchedBatch {
    records: Option<Vec<Record>>,
    checkpoint: Option<String>,
    schema: Option<Schema>,
}

/// Drives sync rounds for one table.
///
/// The write client is lazily constructed once the target schema is known;
/// the schema may come from static configuration or from the first fetched
/// batch, and once fixed it is immutable for the process lifetime.
pub struct SyncRound {
    config: SyncConfig,
    store: Arc<dyn TableStore>,
    source: Box<dyn SourceReader>,
    transformer: Option<Box<dyn Transformer>>,
    key_extractor: Arc<dyn KeyExtractor>,
    catalog: Option<Arc<dyn CatalogSync>>,
    sleeper: Arc<dyn Sleeper + Send + Sync>,
    shape: FetchShape,
    schema: Option<Schema>,
    write_client: Option<WriteClient>,
}

impl SyncRound {
    /// Wire up a driver.
    ///
    /// If the config carries a static schema the write client is built
    /// immediately; otherwise construction is deferred to the first batch.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when the statically-known writer
    /// configuration violates a construction invariant.
    pub fn new(config: SyncConfig, collaborators: RoundCollaborators) -> Result<Self, SyncError> {
        let RoundCollaborators {
            store,
            source,
            transformer,
            key_extractor,
            catalog,
            sleeper,
        } = collaborators;

        let key_extractor = key_extractor.unwrap_or_else(|| {
            Arc::new(SimpleKeyExtractor::new(
                config.key_field.clone(),
                config.partition_field.clone(),
            ))
        });
        let shape = if transformer.is_some() {
            FetchShape::Rows
        } else {
            FetchShape::Records
        };
        let schema = config
            .schema
            .as_ref()
            .map(|document| Schema::new(config.table_name.clone(), document.clone()));

        let mut round = Self {
            config,
            store,
            source,
            transformer,
            key_extractor,
            catalog,
            sleeper,
            shape,
            schema,
            write_client: None,
        };
        if round.schema.is_some() {
            round.ensure_write_client()?;
        }
        Ok(round)
    }

    fn ensure_write_client(&mut self) -> Result<(), SyncError> {
        if self.write_client.is_some() {
            return Ok(());
        }
        let schema = self
            .schema
            .clone()
            .ok_or_else(|| SyncError::Source("no schema available for write client".into()))?;
        let writer_config = WriterConfig::from_sync_config(&self.config, schema);
        self.write_client = Some(WriteClient::new(
            self.store.clone(),
            writer_config,
            &self.config,
            self.sleeper.clone(),
        )?);
        Ok(())
    }

    /// Pull one batch in the shape selected at construction, applying the
    /// transformer on the row path.
    fn read_from_source(&mut self, resume: Option<&str>) -> Result<FetchedBatch, SyncError> {
        match self.shape {
            FetchShape::Rows => {
                let input = self.source.fetch_rows(resume, self.config.source_limit)?;
                let transformer = self
                    .transformer
                    .as_ref()
                    .expect("row shape implies a transformer");
                let records = input.batch.map(|rows| transformer.apply(rows)).transpose()?;
                Ok(FetchedBatch {
                    records,
                    checkpoint: input.checkpoint,
                    schema: input.schema,
                })
            }
            FetchShape::Records => {
                let input = self
                    .source
                    .fetch_records(resume, self.config.source_limit)?;
                Ok(FetchedBatch {
                    records: input.batch,
                    checkpoint: input.checkpoint,
                    schema: input.schema,
                })
            }
        }
    }

    /// Run one round of sync and return the compaction instant if one got
    /// scheduled.
    ///
    /// Repeated invocations with no upstream progress are no-ops.
    ///
    /// # Errors
    ///
    /// Propagates fatal errors from any step; see [`SyncError`].
    pub fn run_once(&mut self) -> Result<Option<InstantId>, SyncError> {
        let ctx = resolver::resolve(self.store.as_ref(), &self.config)?;

        let fetched = self.read_from_source(ctx.resume.as_deref())?;

        if fetched.checkpoint == ctx.resume {
            tracing::info!(
                checkpoint = ?ctx.resume,
                "No new data, source checkpoint has not changed; nothing to commit"
            );
            return Ok(None);
        }
        let Some(checkpoint) = fetched.checkpoint else {
            // A source that returns no checkpoint has made no resumable
            // progress; committing would violate the resume invariant.
            tracing::warn!("Source returned a batch without a checkpoint; skipping round");
            return Ok(None);
        };

        if self.schema.is_none() {
            self.schema = fetched.schema;
        }
        self.ensure_write_client()?;

        let prepared: Vec<PreparedRecord> = match fetched.records {
            None => Vec::new(),
            Some(records) if records.is_empty() => Vec::new(),
            Some(records) => {
                let prepared =
                    prepare_records(records, self.key_extractor.as_ref(), &self.config.ordering_field)?;
                if self.config.filter_dupes {
                    dedup_records(prepared)
                } else {
                    prepared
                }
            }
        };
        let is_empty = prepared.is_empty();
        if is_empty {
            tracing::info!(checkpoint, "No new records, performing empty commit");
        }

        let client = self
            .write_client
            .as_ref()
            .expect("write client built before write");
        let scheduled = client.write_and_commit(&prepared, &checkpoint, ctx.reset.as_deref())?;
        drop(prepared);

        if !is_empty {
            catalog::trigger(
                self.catalog.as_deref(),
                &self.config,
                self.schema.as_ref(),
            );
        }

        Ok(scheduled)
    }

    /// Release the write client and all held transactional resources.
    /// Safe to call multiple times.
    pub fn close(&mut self) {
        if let Some(client) = self.write_client.as_mut() {
            client.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakesync_types::config::WriteOperation;
    use serde_json::json;

    #[test]
    fn shape_follows_transformer_presence() {
        struct NoopTransformer;
        impl Transformer for NoopTransformer {
            fn apply(
                &self,
                rows: Vec<lakesync_types::record::Row>,
            ) -> Result<Vec<lakesync_types::record::Row>, SyncError> {
                Ok(rows)
            }
        }

        let config: SyncConfig = serde_json::from_value(json!({
            "table_path": "/data/t",
            "table_name": "t",
            "table_type": "copy_on_write",
            "operation": "insert",
            "key_field": "id",
            "ordering_field": "ts",
        }))
        .unwrap();
        assert_eq!(config.operation, WriteOperation::Insert);

        let store = Arc::new(lakesync_testkit::MemoryTableStore::new());
        let source = Box::new(lakesync_testkit::ScriptedSource::empty());
        let round = SyncRound::new(
            config.clone(),
            RoundCollaborators::new(store.clone(), source),
        )
        .unwrap();
        assert_eq!(round.shape, FetchShape::Records);

        let source = Box::new(lakesync_testkit::ScriptedSource::empty());
        let round = SyncRound::new(
            config,
            RoundCollaborators::new(store, source).with_transformer(Box::new(NoopTransformer)),
        )
        .unwrap();
        assert_eq!(round.shape, FetchShape::Rows);
    }
}
