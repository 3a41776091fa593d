//! In-memory collaborator implementations for testing the lakesync engine.
//!
//! Nothing here is a storage engine: [`MemoryTableStore`] is a scriptable
//! test double of the [`TableStore`](lakesync_engine::store::TableStore)
//! contract, [`ScriptedSource`] replays pre-built batches, and
//! [`RecordingCatalog`] captures catalog sync calls.

mod catalog;
mod source;
mod store;

pub use catalog::RecordingCatalog;
pub use source::ScriptedSource;
pub use store::MemoryTableStore;
