//! Catalog sync trigger.
//!
//! After a successful non-empty commit the engine publishes the table's
//! schema and partition layout to an external catalog service so
//! downstream consumers can discover the new data. The catalog owns its
//! own failure policy; a failed sync is surfaced through the error channel
//! but does not fail the round.

use lakesync_types::config::SyncConfig;

use crate::source::Schema;

/// Table metadata published to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTableInfo {
    pub table_name: String,
    pub table_path: String,
    pub schema: Option<Schema>,
    pub partition_fields: Vec<String>,
}

/// External catalog/metastore collaborator.
pub trait CatalogSync: Send + Sync {
    /// Publish the table's current schema/partition layout.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog rejects or cannot store the
    /// update.
    fn sync_table(&self, info: &CatalogTableInfo) -> anyhow::Result<()>;
}

/// Build the catalog payload for the current table state.
#[must_use]
pub fn table_info(config: &SyncConfig, schema: Option<&Schema>) -> CatalogTableInfo {
    CatalogTableInfo {
        table_name: config.catalog_table_name().to_string(),
        table_path: config.table_path.clone(),
        schema: schema.cloned(),
        partition_fields: config.partition_field.iter().cloned().collect(),
    }
}

/// Invoke catalog sync if enabled, surfacing failures without failing the
/// caller.
pub fn trigger(catalog: Option<&dyn CatalogSync>, config: &SyncConfig, schema: Option<&Schema>) {
    if !config.catalog_sync.enabled {
        return;
    }
    let Some(catalog) = catalog else {
        tracing::warn!(
            table = config.table_name,
            "Catalog sync enabled but no catalog collaborator configured"
        );
        return;
    };

    let info = table_info(config, schema);
    tracing::info!(
        table = info.table_name,
        path = info.table_path,
        "Syncing table metadata to catalog"
    );
    if let Err(err) = catalog.sync_table(&info) {
        tracing::error!(
            table = info.table_name,
            error = %err,
            "Catalog sync failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakesync_testkit::RecordingCatalog;
    use serde_json::json;

    fn config(enabled: bool) -> SyncConfig {
        serde_json::from_value(json!({
            "table_path": "/data/events",
            "table_name": "events",
            "table_type": "copy_on_write",
            "operation": "upsert",
            "key_field": "id",
            "partition_field": "region",
            "ordering_field": "ts",
            "catalog_sync": {"enabled": enabled, "table_name": "warehouse.events"},
        }))
        .unwrap()
    }

    #[test]
    fn trigger_publishes_when_enabled() {
        let catalog = RecordingCatalog::new();
        trigger(Some(&catalog), &config(true), None);
        let synced = catalog.synced();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].table_name, "warehouse.events");
        assert_eq!(synced[0].partition_fields, vec!["region".to_string()]);
    }

    #[test]
    fn trigger_noop_when_disabled() {
        let catalog = RecordingCatalog::new();
        trigger(Some(&catalog), &config(false), None);
        assert!(catalog.synced().is_empty());
    }

    #[test]
    fn trigger_swallows_catalog_failure() {
        let catalog = RecordingCatalog::new();
        catalog.fail_next();
        // Must not panic or propagate.
        trigger(Some(&catalog), &config(true), None);
        assert!(catalog.synced().is_empty());
    }
}
