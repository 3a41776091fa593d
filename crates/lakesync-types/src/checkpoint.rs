//! Checkpoint metadata keys and the per-round checkpoint context.
//!
//! A checkpoint is an opaque token the source hands back with every batch,
//! marking how far upstream data has been consumed. The engine persists it
//! verbatim in the metadata of the commit that made the batch visible, so
//! that the next round can resume exactly where this one left off.

use serde::{Deserialize, Serialize};

/// Commit-metadata key holding the resume checkpoint.
///
/// The value stored under this key is passed back to the source on the next
/// round. Stable across versions; do not change.
pub const CHECKPOINT_KEY: &str = "lakesync.checkpoint.key";

/// Commit-metadata key holding the last user-supplied checkpoint override.
///
/// Present only on commits produced by a round that actively used an
/// override. Stable across versions; do not change.
pub const CHECKPOINT_RESET_KEY: &str = "lakesync.checkpoint.reset_key";

/// Resolved checkpoint state for one sync round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointContext {
    /// Token to pass to the source for this round. `None` means the source
    /// picks its own starting point (bootstrap).
    pub resume: Option<String>,
    /// User-supplied override that was actively used this round, to be
    /// recorded as the reset marker on the resulting commit.
    pub reset: Option<String>,
}

impl CheckpointContext {
    /// Context that lets the source choose its own starting point.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::default()
    }

    /// Context resuming from a previously persisted checkpoint.
    #[must_use]
    pub fn resume_from(token: impl Into<String>) -> Self {
        Self {
            resume: Some(token.into()),
            reset: None,
        }
    }

    /// Context resuming from a user-supplied override. The override is also
    /// recorded as the reset marker on the next commit.
    #[must_use]
    pub fn reset_to(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            resume: Some(token.clone()),
            reset: Some(token),
        }
    }
}
