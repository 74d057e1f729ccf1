//! Catalog persistence seam.
//!
//! The relational store backing the catalog is an external collaborator;
//! the pipeline only depends on this trait. Writes are upsert-by-key and
//! commit independently per table: no transaction spans table iterations,
//! and concurrent writers to the same key resolve last-write-wins.
//! [`InMemoryCatalog`] is the reference implementation used by the worker
//! and the test suite.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{Alert, MetricHistory, Source, TableMetadata};

/// Upsert-by-key persistence for catalog records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Registers a source. Source names are globally unique.
    async fn create_source(&self, source: Source) -> Result<Source>;

    /// Looks up a source by id.
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>>;

    /// Looks up a source by its unique name.
    async fn get_source_by_name(&self, name: &str) -> Result<Option<Source>>;

    /// Deletes a source and cascades to its metadata, history, and alerts.
    async fn delete_source(&self, id: Uuid) -> Result<()>;

    /// Finds the metadata record for one `(source, schema, table)` key.
    async fn find_table_metadata(
        &self,
        source_id: Uuid,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Option<TableMetadata>>;

    /// Upserts a metadata record by its `(source, schema, table)` key.
    ///
    /// An existing record under the same key is replaced; the invariant of
    /// at most one record per key is the store's responsibility.
    async fn upsert_table_metadata(&self, record: TableMetadata) -> Result<TableMetadata>;

    /// Lists all metadata records for a source.
    async fn list_table_metadata(&self, source_id: Uuid) -> Result<Vec<TableMetadata>>;

    /// Appends an immutable history snapshot.
    async fn insert_metric_history(&self, history: MetricHistory) -> Result<()>;

    /// Lists history snapshots for a metadata record.
    async fn list_metric_history(&self, table_metadata_id: Uuid) -> Result<Vec<MetricHistory>>;

    /// Persists a batch of alerts.
    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()>;

    /// Lists alerts for a metadata record.
    async fn list_alerts(&self, table_metadata_id: Uuid) -> Result<Vec<Alert>>;
}

#[derive(Default)]
struct CatalogState {
    sources: HashMap<Uuid, Source>,
    tables: HashMap<(Uuid, String, String), TableMetadata>,
    history: Vec<MetricHistory>,
    alerts: Vec<Alert>,
}

/// In-memory catalog store.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn create_source(&self, source: Source) -> Result<Source> {
        let mut state = self.inner.write().await;
        if state.sources.values().any(|s| s.name == source.name) {
            return Err(CatalogError::store_failed(format!(
                "source name '{}' is already registered",
                source.name
            )));
        }
        state.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        Ok(self.inner.read().await.sources.get(&id).cloned())
    }

    async fn get_source_by_name(&self, name: &str) -> Result<Option<Source>> {
        Ok(self
            .inner
            .read()
            .await
            .sources
            .values()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn delete_source(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.write().await;
        state.sources.remove(&id);

        let table_ids: Vec<Uuid> = state
            .tables
            .values()
            .filter(|t| t.source_id == id)
            .map(|t| t.id)
            .collect();

        state.tables.retain(|_, t| t.source_id != id);
        state
            .history
            .retain(|h| !table_ids.contains(&h.table_metadata_id));
        state
            .alerts
            .retain(|a| !table_ids.contains(&a.table_metadata_id));
        Ok(())
    }

    async fn find_table_metadata(
        &self,
        source_id: Uuid,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Option<TableMetadata>> {
        let key = (source_id, schema_name.to_string(), table_name.to_string());
        Ok(self.inner.read().await.tables.get(&key).cloned())
    }

    async fn upsert_table_metadata(&self, record: TableMetadata) -> Result<TableMetadata> {
        let key = (
            record.source_id,
            record.schema_name.clone(),
            record.table_name.clone(),
        );
        self.inner.write().await.tables.insert(key, record.clone());
        Ok(record)
    }

    async fn list_table_metadata(&self, source_id: Uuid) -> Result<Vec<TableMetadata>> {
        let state = self.inner.read().await;
        let mut records: Vec<TableMetadata> = state
            .tables
            .values()
            .filter(|t| t.source_id == source_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (&a.schema_name, &a.table_name).cmp(&(&b.schema_name, &b.table_name))
        });
        Ok(records)
    }

    async fn insert_metric_history(&self, history: MetricHistory) -> Result<()> {
        self.inner.write().await.history.push(history);
        Ok(())
    }

    async fn list_metric_history(&self, table_metadata_id: Uuid) -> Result<Vec<MetricHistory>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .iter()
            .filter(|h| h.table_metadata_id == table_metadata_id)
            .cloned()
            .collect())
    }

    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()> {
        self.inner.write().await.alerts.extend_from_slice(alerts);
        Ok(())
    }

    async fn list_alerts(&self, table_metadata_id: Uuid) -> Result<Vec<Alert>> {
        Ok(self
            .inner
            .read()
            .await
            .alerts
            .iter()
            .filter(|a| a.table_metadata_id == table_metadata_id)
            .cloned()
            .collect())
    }
}
