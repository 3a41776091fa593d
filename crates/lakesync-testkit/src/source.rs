//! Scripted source reader replaying pre-built batches.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use lakesync_engine::source::{InputBatch, Schema, SourceReader};
use lakesync_types::error::SyncError;
use lakesync_types::record::{Record, Row};

struct Inner {
    batches: VecDeque<InputBatch<Record>>,
    fail_next: bool,
    fetch_log: Vec<Option<String>>,
}

/// Replays a fixed sequence of batches, then reports no further progress
/// (end checkpoint equal to the resume checkpoint).
///
/// Both fetch shapes serve the same scripted data; rows and generic
/// records share one underlying representation. Clones share state, so a
/// test can keep one handle for assertions after handing the other to the
/// driver.
#[derive(Clone)]
pub struct ScriptedSource {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedSource {
    /// Source that replays `batches` in order.
    #[must_use]
    pub fn new(batches: Vec<InputBatch<Record>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                batches: batches.into(),
                fail_next: false,
                fetch_log: Vec::new(),
            })),
        }
    }

    /// Source that never has new data.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build a batch ending at `checkpoint`, with a default schema attached.
    #[must_use]
    pub fn batch(records: Vec<Record>, checkpoint: &str) -> InputBatch<Record> {
        InputBatch {
            batch: Some(records),
            checkpoint: Some(checkpoint.to_string()),
            schema: Some(Schema::new("scripted", serde_json::json!({"fields": []}))),
        }
    }

    /// Build a record-less batch whose checkpoint still advanced.
    #[must_use]
    pub fn empty_batch(checkpoint: &str) -> InputBatch<Record> {
        InputBatch {
            batch: None,
            checkpoint: Some(checkpoint.to_string()),
            schema: Some(Schema::new("scripted", serde_json::json!({"fields": []}))),
        }
    }

    /// Fail the next fetch with a source error.
    pub fn fail_next(&self) {
        self.inner.lock().expect("source lock poisoned").fail_next = true;
    }

    /// Resume checkpoints observed by each fetch, in call order.
    #[must_use]
    pub fn fetch_log(&self) -> Vec<Option<String>> {
        self.inner
            .lock()
            .expect("source lock poisoned")
            .fetch_log
            .clone()
    }

    fn fetch(&self, resume: Option<&str>, limit: u64) -> Result<InputBatch<Record>, SyncError> {
        let mut inner = self.inner.lock().expect("source lock poisoned");
        inner.fetch_log.push(resume.map(str::to_string));
        if inner.fail_next {
            inner.fail_next = false;
            return Err(SyncError::Source("injected source failure".into()));
        }
        match inner.batches.pop_front() {
            Some(mut batch) => {
                if let Some(records) = batch.batch.as_mut() {
                    if (limit as usize) < records.len() {
                        records.truncate(limit as usize);
                    }
                }
                Ok(batch)
            }
            None => Ok(InputBatch {
                batch: None,
                checkpoint: resume.map(str::to_string),
                schema: None,
            }),
        }
    }
}

impl SourceReader for ScriptedSource {
    fn fetch_rows(
        &mut self,
        resume: Option<&str>,
        limit: u64,
    ) -> Result<InputBatch<Row>, SyncError> {
        self.fetch(resume, limit)
    }

    fn fetch_records(
        &mut self,
        resume: Option<&str>,
        limit: u64,
    ) -> Result<InputBatch<Record>, SyncError> {
        self.fetch(resume, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replays_batches_then_reports_no_progress() {
        let mut source = ScriptedSource::new(vec![ScriptedSource::batch(
            vec![json!({"id": "a"})],
            "ck1",
        )]);

        let first = source.fetch_records(None, u64::MAX).unwrap();
        assert_eq!(first.checkpoint.as_deref(), Some("ck1"));
        assert!(!first.is_empty());

        let second = source.fetch_records(Some("ck1"), u64::MAX).unwrap();
        assert_eq!(second.checkpoint.as_deref(), Some("ck1"));
        assert!(second.is_empty());

        assert_eq!(
            source.fetch_log(),
            vec![None, Some("ck1".to_string())]
        );
    }

    #[test]
    fn respects_source_limit() {
        let mut source = ScriptedSource::new(vec![ScriptedSource::batch(
            vec![json!({"id": "a"}), json!({"id": "b"}), json!({"id": "c"})],
            "ck1",
        )]);
        let batch = source.fetch_records(None, 2).unwrap();
        assert_eq!(batch.batch.unwrap().len(), 2);
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut source = ScriptedSource::empty();
        source.fail_next();
        assert!(source.fetch_records(None, 10).is_err());
        assert!(source.fetch_records(None, 10).is_ok());
    }

    #[test]
    fn clones_share_state() {
        let observer = ScriptedSource::new(vec![ScriptedSource::batch(vec![], "ck1")]);
        let mut handle = observer.clone();
        handle.fetch_records(None, 10).unwrap();
        assert_eq!(observer.fetch_log().len(), 1);
        assert!(handle.fetch_records(Some("ck1"), 10).unwrap().is_empty());
    }
}
