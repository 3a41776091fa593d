//! Recording catalog sync double.

use std::sync::Mutex;

use lakesync_engine::catalog::{CatalogSync, CatalogTableInfo};

/// Captures catalog sync calls; can fail on demand.
pub struct RecordingCatalog {
    synced: Mutex<Vec<CatalogTableInfo>>,
    fail_next: Mutex<bool>,
}

impl RecordingCatalog {
    /// A catalog that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            synced: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }

    /// Fail the next sync call.
    pub fn fail_next(&self) {
        *self.fail_next.lock().expect("catalog lock poisoned") = true;
    }

    /// All successfully recorded sync calls.
    #[must_use]
    pub fn synced(&self) -> Vec<CatalogTableInfo> {
        self.synced.lock().expect("catalog lock poisoned").clone()
    }
}

impl Default for RecordingCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogSync for RecordingCatalog {
    fn sync_table(&self, info: &CatalogTableInfo) -> anyhow::Result<()> {
        let mut fail = self.fail_next.lock().expect("catalog lock poisoned");
        if *fail {
            *fail = false;
            anyhow::bail!("injected catalog failure");
        }
        self.synced
            .lock()
            .expect("catalog lock poisoned")
            .push(info.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakesync_engine::source::Schema;

    fn info() -> CatalogTableInfo {
        CatalogTableInfo {
            table_name: "events".into(),
            table_path: "/data/events".into(),
            schema: Some(Schema::new("events", serde_json::json!({}))),
            partition_fields: vec![],
        }
    }

    #[test]
    fn records_successful_syncs() {
        let catalog = RecordingCatalog::new();
        catalog.sync_table(&info()).unwrap();
        assert_eq!(catalog.synced().len(), 1);
    }

    #[test]
    fn injected_failure_fires_once() {
        let catalog = RecordingCatalog::new();
        catalog.fail_next();
        assert!(catalog.sync_table(&info()).is_err());
        assert!(catalog.sync_table(&info()).is_ok());
        assert_eq!(catalog.synced().len(), 1);
    }
}
