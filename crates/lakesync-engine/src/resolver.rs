//! Checkpoint resolution against the table's commit history.
//!
//! Every round resolves fresh: the table may have been mutated externally
//! (e.g. by a concurrent compactor) since the previous round.

use lakesync_types::checkpoint::CheckpointContext;
use lakesync_types::config::SyncConfig;
use lakesync_types::error::SyncError;
use lakesync_types::table::TableInit;

use crate::store::TableStore;

/// Determine which checkpoint to resume reading from.
///
/// A new table is initialized as a side effect. With history present, the
/// last completed commit decides: a user override differing from that
/// commit's reset marker wins (deliberate re-read); otherwise the recorded
/// resume checkpoint is used; a commit with neither is a fatal
/// inconsistency, never a silent restart from scratch. With no history and
/// no override the source picks its own starting point.
///
/// # Errors
///
/// Returns [`SyncError::CheckpointInconsistency`] for a table with history
/// but no resume checkpoint, [`SyncError::TableTypeMismatch`] when the
/// stored table type differs from the configured one, and store errors
/// from metadata access.
pub fn resolve(store: &dyn TableStore, config: &SyncConfig) -> Result<CheckpointContext, SyncError> {
    if !store.metadata_exists()? {
        tracing::info!(
            table = config.table_name,
            path = config.table_path,
            table_type = %config.table_type,
            "Table does not exist yet, initializing"
        );
        store.init_table(&TableInit {
            table_type: config.table_type,
            table_name: config.table_name.clone(),
        })?;
        return Ok(CheckpointContext {
            resume: config.checkpoint.clone(),
            reset: config.checkpoint.clone(),
        });
    }

    let descriptor = store.open_metadata()?;
    if descriptor.table_type != config.table_type {
        return Err(SyncError::TableTypeMismatch {
            expected: config.table_type,
            actual: descriptor.table_type,
        });
    }

    let resolved = match descriptor.timeline.last_completed() {
        Some(last) => {
            let metadata = descriptor.metadata_for(&last.id);
            let recorded_reset = metadata.reset_checkpoint();

            if let Some(override_ck) = config
                .checkpoint
                .as_deref()
                .filter(|ck| Some(*ck) != recorded_reset)
            {
                // Deliberate re-read from the override point.
                tracing::info!(
                    last_instant = %last.id,
                    checkpoint = override_ck,
                    "Resuming from user-supplied checkpoint override"
                );
                Some(override_ck.to_string())
            } else if let Some(resume) = metadata.resume_checkpoint() {
                Some(resume.to_string())
            } else {
                let instants = descriptor
                    .timeline
                    .completed()
                    .iter()
                    .map(|i| i.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let metadata_json = serde_json::to_string(&metadata)
                    .unwrap_or_else(|_| "<unserializable>".into());
                return Err(SyncError::CheckpointInconsistency {
                    last_instant: last.id.clone(),
                    instants,
                    metadata: metadata_json,
                });
            }
        }
        None => None,
    };

    let resume = resolved.or_else(|| config.checkpoint.clone());
    tracing::info!(checkpoint = ?resume, "Checkpoint to resume from");

    Ok(CheckpointContext {
        resume,
        // The reset marker is carried on every commit made while an
        // override is configured, so repeated rounds with the same
        // override do not re-trigger the reset.
        reset: config.checkpoint.clone(),
    })
}
