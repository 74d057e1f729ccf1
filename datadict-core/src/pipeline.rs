//! Extraction pipeline orchestration.
//!
//! A run sequences the full pipeline for one source: extract table
//! descriptors, then per table profile → sanitize → summarize → persist
//! (history first, then upsert, then alerts) → export artifacts. Failures
//! are contained at table granularity: one bad table is logged and counted
//! but never aborts the rest of the run. Only a missing source record is
//! fatal.
//!
//! Tables are processed sequentially within a run; concurrency happens
//! across runs, which share nothing but the persistent store. Concurrent
//! runs of the same source are not mutually excluded; the store's
//! upsert-by-key resolves them last-write-wins.

use chrono::Utc;
use uuid::Uuid;

use crate::artifacts::{self, ArtifactStore};
use crate::dialects;
use crate::error::{CatalogError, Result, redact_connection_url};
use crate::history;
use crate::inspect;
use crate::models::{QualityProfile, Source, TableDescriptor, TableMetadata};
use crate::profile;
use crate::sanitize;
use crate::store::CatalogStore;
use crate::summarize::{SUMMARY_PLACEHOLDER, TextGenerator};

/// Tuning knobs for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Row cap for profiling samples
    pub sample_size: u32,
    /// Cooperative throttle between successive summarization calls
    /// (not applied before the first)
    pub pacing_delay_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            sample_size: profile::SAMPLE_ROW_CAP,
            pacing_delay_ms: 500,
        }
    }
}

/// Observability counters for a completed run.
///
/// The dispatcher ignores this; outputs are observable through the
/// persisted records and exported artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tables_total: usize,
    pub tables_processed: usize,
    pub tables_failed: usize,
}

/// One source's extraction pipeline over its external collaborators.
pub struct Pipeline<'a> {
    store: &'a dyn CatalogStore,
    text: &'a dyn TextGenerator,
    artifacts: &'a dyn ArtifactStore,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    /// Assembles a pipeline over its collaborators.
    pub fn new(
        store: &'a dyn CatalogStore,
        text: &'a dyn TextGenerator,
        artifacts: &'a dyn ArtifactStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            text,
            artifacts,
            options,
        }
    }

    /// Runs the extraction pipeline for one source.
    ///
    /// # Errors
    /// Returns an error only when the source record does not exist; every
    /// other failure is contained and reflected in the [`RunSummary`].
    pub async fn run(&self, source_id: Uuid) -> Result<RunSummary> {
        let source = self
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| CatalogError::source_not_found(source_id.to_string()))?;

        tracing::info!(
            "Starting extraction for source '{}' ({})",
            source.name,
            redact_connection_url(&source.connection_url)
        );

        let dialect = match dialects::connect(source.kind, &source.connection_url).await {
            Ok(dialect) => dialect,
            Err(e) => {
                // An unreachable source yields zero tables, not a failed run
                tracing::warn!("Source '{}' is unreachable: {}", source.name, e);
                return Ok(RunSummary::default());
            }
        };

        let tables = inspect::extract_tables(dialect.as_ref()).await;
        if tables.is_empty() {
            tracing::info!("Source '{}' exposed no tables", source.name);
            return Ok(RunSummary::default());
        }

        let mut summary = RunSummary {
            tables_total: tables.len(),
            ..RunSummary::default()
        };

        for (index, table) in tables.iter().enumerate() {
            match self
                .process_table(&source, dialect.as_ref(), table, index)
                .await
            {
                Ok(()) => summary.tables_processed += 1,
                Err(e) => {
                    tracing::warn!(
                        "Table '{}' failed and was skipped: {}",
                        table.qualified_name(),
                        e
                    );
                    summary.tables_failed += 1;
                }
            }
        }

        tracing::info!(
            "Extraction completed for source '{}': {} processed, {} failed of {} tables",
            source.name,
            summary.tables_processed,
            summary.tables_failed,
            summary.tables_total
        );

        Ok(summary)
    }

    async fn process_table(
        &self,
        source: &Source,
        dialect: &dyn dialects::SourceDialect,
        table: &TableDescriptor,
        index: usize,
    ) -> Result<()> {
        // Profiling: any failure yields an empty profile for this table
        let quality = match dialect
            .sample_table(
                &table.schema_name,
                &table.table_name,
                self.options.sample_size,
            )
            .await
        {
            Ok(sample) => profile::profile_sample(table, &sample),
            Err(e) => {
                tracing::warn!(
                    "Profiling failed for '{}', recording empty profile: {}",
                    table.qualified_name(),
                    e
                );
                QualityProfile::default()
            }
        };
        let quality = sanitize::sanitize_profile(quality);

        // Cooperative throttle between successive summarization calls
        if index > 0 && self.options.pacing_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.options.pacing_delay_ms))
                .await;
        }

        let summary = match self.text.generate_summary(table, &quality).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    "Summarization failed for '{}', using placeholder: {}",
                    table.qualified_name(),
                    e
                );
                SUMMARY_PLACEHOLDER.to_string()
            }
        };

        // Persist: history snapshot before the upsert, alerts after
        let previous = self
            .store
            .find_table_metadata(source.id, &table.schema_name, &table.table_name)
            .await?;
        let record_id = previous.as_ref().map_or_else(Uuid::new_v4, |p| p.id);

        let outcome = history::reconcile(
            previous.as_ref(),
            &quality,
            record_id,
            &table.qualified_name(),
        );

        if let Some(snapshot) = outcome.history {
            self.store.insert_metric_history(snapshot).await?;
        }

        let record = self
            .store
            .upsert_table_metadata(TableMetadata {
                id: record_id,
                source_id: source.id,
                schema_name: table.schema_name.clone(),
                table_name: table.table_name.clone(),
                columns: table.columns.clone(),
                relationships: table.foreign_keys.clone(),
                summary,
                quality,
                updated_at: Utc::now(),
            })
            .await?;

        if !outcome.alerts.is_empty() {
            self.store.insert_alerts(&outcome.alerts).await?;
        }

        // Export failures are logged and swallowed, never propagated
        self.export_artifacts(&source.name, &record).await;

        Ok(())
    }

    async fn export_artifacts(&self, source_name: &str, record: &TableMetadata) {
        let json_key = artifacts::artifact_key(
            source_name,
            &record.schema_name,
            &record.table_name,
            "json",
        );
        match artifacts::build_json_artifact(record) {
            Ok(bytes) => {
                if let Err(e) = self
                    .artifacts
                    .put_object(&json_key, "application/json", bytes)
                    .await
                {
                    tracing::warn!("Artifact export failed for '{}': {}", json_key, e);
                }
            }
            Err(e) => {
                tracing::warn!("Artifact serialization failed for '{}': {}", json_key, e);
            }
        }

        let md_key = artifacts::artifact_key(
            source_name,
            &record.schema_name,
            &record.table_name,
            "md",
        );
        let document = artifacts::render_markdown(source_name, record);
        if let Err(e) = self
            .artifacts
            .put_object(&md_key, "text/markdown", document.into_bytes())
            .await
        {
            tracing::warn!("Artifact export failed for '{}': {}", md_key, e);
        }
    }
}
