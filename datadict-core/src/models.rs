//! Core data models for the catalog pipeline.
//!
//! This module defines the records persisted by the catalog (sources,
//! table metadata, metric history, alerts) and the transient shapes that
//! flow through an extraction run (table descriptors, samples, quality
//! profiles). All models are serde-serializable.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::SensitivityTag;

/// Supported source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::PostgreSQL => write!(f, "PostgreSQL"),
            SourceKind::MySQL => write!(f, "MySQL"),
            SourceKind::SQLite => write!(f, "SQLite"),
        }
    }
}

/// A registered, named connection to an external relational data store.
///
/// Names are globally unique; registration triggers one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    /// Opaque connection descriptor; never logged unredacted
    pub connection_url: String,
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Creates a new source record with a generated id.
    pub fn new(name: impl Into<String>, kind: SourceKind, connection_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            connection_url: connection_url.into(),
            created_at: Utc::now(),
        }
    }
}

/// Column enumeration result: name, normalized type string, sensitivity tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Dialect type name normalized to a plain string (e.g. "integer", "text")
    pub data_type: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<SensitivityTag>,
}

/// Declared foreign key: referencing column set and referenced target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub columns: Vec<String>,
    /// Defaulted to the owning table's schema when the driver omits it
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Transient enumeration result describing one table.
///
/// Produced fresh on each extraction and mapped into [`TableMetadata`];
/// never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl TableDescriptor {
    /// Schema-qualified display name, e.g. `public.users`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// Bounded row sample from one table, rows as JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSample {
    pub schema_name: String,
    pub table_name: String,
    pub rows: Vec<serde_json::Value>,
    pub sample_size: u32,
    pub collected_at: DateTime<Utc>,
}

/// Numeric distribution summary for a numeric-typed column.
///
/// Every field is optional: statistics undefined on the sampled values
/// (all-null column, single-row standard deviation) are recorded as absent,
/// and the sanitizer clears any non-finite result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p75: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Recency signal derived from a time-like column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub max_timestamp: DateTime<Utc>,
    pub min_timestamp: DateTime<Utc>,
    /// Whole days between now and the most recent timestamp
    pub days_since_max: i64,
}

/// One frequent categorical value with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: String,
    pub count: u64,
}

/// Per-column statistics computed from a bounded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Fraction of sampled values that are non-null (0.0-1.0)
    pub completeness: f64,
    /// Distinct count over sample size (0.0-1.0; 0 for an empty sample)
    pub uniqueness: f64,
    pub distinct_count: u64,
    /// Storage type as inferred/declared for the column
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Freshness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_values: Option<Vec<TopValue>>,
}

/// Per-table quality profile: column name → statistics.
///
/// A table with zero sampled rows yields the `empty_table` sentinel with no
/// per-column statistics instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty_table: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnStats>,
}

impl QualityProfile {
    /// Sentinel profile for a table whose sample contained zero rows.
    pub fn empty_table() -> Self {
        Self {
            empty_table: true,
            columns: BTreeMap::new(),
        }
    }

    /// Profile carrying per-column statistics.
    pub fn from_columns(columns: BTreeMap<String, ColumnStats>) -> Self {
        Self {
            empty_table: false,
            columns,
        }
    }
}

/// Persisted catalog record for one table of one source.
///
/// At most one record exists per `(source_id, schema_name, table_name)`;
/// extraction upserts by that composite key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub id: Uuid,
    pub source_id: Uuid,
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub relationships: Vec<ForeignKeyDescriptor>,
    /// Narrative summary text from the text-generation capability
    pub summary: String,
    pub quality: QualityProfile,
    pub updated_at: DateTime<Utc>,
}

/// Immutable snapshot of a prior quality profile, taken before overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricHistory {
    pub id: Uuid,
    pub table_metadata_id: Uuid,
    pub quality: QualityProfile,
    pub captured_at: DateTime<Utc>,
}

/// Kind of quality violation behind an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Completeness,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Completeness => write!(f, "completeness"),
        }
    }
}

/// Severity of a quality alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

/// A recorded quality-threshold violation tied to one table and one
/// extraction pass. Resolution is an external action; new runs that still
/// violate the threshold raise new alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub table_metadata_id: Uuid,
    pub kind: AlertKind,
    pub message: String,
    pub severity: AlertSeverity,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Creates an unresolved alert with a generated id.
    pub fn new(
        table_metadata_id: Uuid,
        kind: AlertKind,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_metadata_id,
            kind,
            message: message.into(),
            severity,
            resolved: false,
            created_at: Utc::now(),
        }
    }
}
