//! Record preparation and batch-local deduplication.
//!
//! Preparation turns raw records into the table's native form: extracted
//! key, ordering value, payload. Dedup collapses multiple updates to the
//! same key within one batch to the single record with the greatest
//! ordering value; the round then writes with insert-only semantics, since
//! dedup and merge-on-write are mutually exclusive conflict policies.

use std::collections::HashMap;

use lakesync_types::error::SyncError;
use lakesync_types::record::{OrderingValue, PreparedRecord, Record, RecordKey};

use crate::keygen::{nested_field, KeyExtractor};

/// Convert raw records into [`PreparedRecord`]s.
///
/// The ordering value comes from `ordering_field`; a record missing that
/// field gets [`OrderingValue::Null`], which loses every dedup tie.
///
/// # Errors
///
/// Returns [`SyncError::Prepare`] when key extraction fails for any record.
pub fn prepare_records(
    records: Vec<Record>,
    extractor: &dyn KeyExtractor,
    ordering_field: &str,
) -> Result<Vec<PreparedRecord>, SyncError> {
    records
        .into_iter()
        .map(|record| {
            let key = extractor.key(&record)?;
            let ordering = OrderingValue::from_json(nested_field(&record, ordering_field));
            Ok(PreparedRecord {
                key,
                ordering,
                payload: record,
            })
        })
        .collect()
}

/// Collapse records sharing a key to at most one each: the record with the
/// greatest ordering value among its duplicates.
///
/// Output preserves the first-occurrence order of keys.
#[must_use]
pub fn dedup_records(records: Vec<PreparedRecord>) -> Vec<PreparedRecord> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut best: HashMap<RecordKey, PreparedRecord> = HashMap::with_capacity(records.len());

    for record in records {
        match best.get(&record.key) {
            None => {
                order.push(record.key.clone());
                best.insert(record.key.clone(), record);
            }
            Some(existing) => {
                if record.ordering.cmp_total(&existing.ordering).is_gt() {
                    best.insert(record.key.clone(), record);
                }
            }
        }
    }

    order
        .into_iter()
        .map(|key| best.remove(&key).expect("key recorded on first occurrence"))
        .collect()
}
