//! Schema extraction and data-quality profiling pipeline for DataDict.
//!
//! This crate turns a registered source's connection string into
//! structured schema metadata plus a per-table statistical quality
//! profile, tracks metric history across extractions, and raises
//! threshold-based alerts. Partial failure is the normal case: one
//! unreachable table, namespace, or collaborator never aborts a source's
//! run.
//!
//! # Architecture
//! - Dialect capability interface with one implementation per supported
//!   SQL dialect, selected by a source's declared kind
//! - Pure profiling and sanitization over sampled JSON rows
//! - External collaborators (catalog store, text generation, artifact
//!   store) behind object-safe traits
//! - A sequential per-table orchestrator designed for fire-and-forget
//!   dispatch

pub mod artifacts;
pub mod classify;
pub mod dialects;
pub mod error;
pub mod history;
pub mod inspect;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod sanitize;
pub mod store;
pub mod summarize;

// Re-export commonly used types
pub use artifacts::{ArtifactStore, ObjectStoreArtifacts};
pub use classify::SensitivityTag;
pub use dialects::{SourceDialect, detect_source_kind};
pub use error::{CatalogError, Result, redact_connection_url};
pub use logging::init_logging;
pub use models::{
    Alert, AlertKind, AlertSeverity, ColumnDescriptor, ColumnStats, ForeignKeyDescriptor,
    MetricHistory, QualityProfile, Source, SourceKind, TableDescriptor, TableMetadata, TableSample,
};
pub use pipeline::{Pipeline, PipelineOptions, RunSummary};
pub use store::{CatalogStore, InMemoryCatalog};
pub use summarize::{LlmSummarizer, SUMMARY_PLACEHOLDER, TextGenerator};
