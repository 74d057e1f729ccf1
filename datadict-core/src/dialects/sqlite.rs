//! SQLite dialect implementation.
//!
//! SQLite exposes a single namespace (`main`) and is introspected through
//! `sqlite_master` and PRAGMA statements rather than an information
//! schema. Identifiers are quoted with double quotes.
//!
//! # System objects
//! - `sqlite_master`: schema definitions for all database objects
//! - `PRAGMA table_info()`: column information for a table
//! - `PRAGMA foreign_key_list()`: foreign key information

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};

use super::SourceDialect;
use crate::error::{CatalogError, Result};
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor, SourceKind, TableSample};

/// The only namespace a SQLite connection exposes.
const MAIN_SCHEMA: &str = "main";

/// SQLite implementation of the dialect capability interface.
pub struct SqliteDialect {
    pool: SqlitePool,
}

impl SqliteDialect {
    /// Connects to a SQLite source.
    ///
    /// # Errors
    /// Returns a connection error if the database file cannot be opened.
    pub async fn connect(connection_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(connection_url)
            .await
            .map_err(|e| CatalogError::connection_failed("Failed to open SQLite database", e))?;

        Ok(Self { pool })
    }

    fn quote_ident(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Escapes a table name for embedding in a PRAGMA string literal.
    fn pragma_literal(table: &str) -> String {
        table.replace('\'', "''")
    }
}

#[async_trait]
impl SourceDialect for SqliteDialect {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(vec![MAIN_SCHEMA.to_string()])
    }

    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows = sqlx::query(tables_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::enumeration_failed("Failed to enumerate tables", e))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let table_name: String = row
                .try_get("name")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse table name", e))?;
            tables.push(table_name);
        }

        Ok(tables)
    }

    async fn list_columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let columns_query = format!("PRAGMA table_info('{}')", Self::pragma_literal(table));

        let rows = sqlx::query(&columns_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::enumeration_failed(
                    format!("Failed to collect columns for table '{}'", table),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column name", e))?;
            let declared: String = row
                .try_get("type")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column type", e))?;

            // SQLite allows typeless columns; record them as "any"
            let data_type = if declared.is_empty() {
                "any".to_string()
            } else {
                declared.to_lowercase()
            };

            columns.push(ColumnDescriptor {
                name,
                data_type,
                tags: Default::default(),
            });
        }

        Ok(columns)
    }

    async fn list_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>> {
        let fk_query = format!("PRAGMA foreign_key_list('{}')", Self::pragma_literal(table));

        let rows = sqlx::query(&fk_query).fetch_all(&self.pool).await.map_err(|e| {
            CatalogError::enumeration_failed(
                format!("Failed to collect foreign keys for table '{}'", table),
                e,
            )
        })?;

        // PRAGMA rows arrive one per column, grouped by constraint id and
        // ordered by seq within each group.
        let mut order: Vec<i64> = Vec::new();
        let mut groups: std::collections::HashMap<i64, ForeignKeyDescriptor> =
            std::collections::HashMap::new();

        for row in rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse constraint id", e))?;
            let referenced_table: String = row.try_get("table").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse referenced table", e)
            })?;
            let from: String = row
                .try_get("from")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column name", e))?;
            // "to" is NULL when the key references the target's primary key
            let to: Option<String> = row.try_get("to").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse referenced column", e)
            })?;

            let entry = groups.entry(id).or_insert_with(|| {
                order.push(id);
                ForeignKeyDescriptor {
                    columns: Vec::new(),
                    // The driver never reports a referenced schema here, so
                    // it defaults to the current one.
                    referenced_schema: schema.to_string(),
                    referenced_table,
                    referenced_columns: Vec::new(),
                }
            });
            entry.columns.push(from);
            if let Some(to) = to {
                entry.referenced_columns.push(to);
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| groups.remove(&id))
            .collect())
    }

    fn build_sample_query(&self, _schema: &str, table: &str, limit: u32) -> String {
        format!("SELECT * FROM {} LIMIT {}", Self::quote_ident(table), limit)
    }

    async fn sample_table(&self, schema: &str, table: &str, limit: u32) -> Result<TableSample> {
        let sample_query = self.build_sample_query(schema, table, limit);

        tracing::debug!("Sampling {}: {}", table, sample_query);

        let rows = sqlx::query(&sample_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::profiling_failed(
                    format!("Failed to sample data from table '{}'", table),
                    e,
                )
            })?;

        let json_rows: Vec<JsonValue> = rows.iter().map(row_to_json).collect();
        let sample_size = json_rows.len() as u32;

        Ok(TableSample {
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            rows: json_rows,
            sample_size,
            collected_at: chrono::Utc::now(),
        })
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SQLite
    }

    fn default_schema(&self) -> String {
        MAIN_SCHEMA.to_string()
    }
}

/// Converts a SQLite row into a JSON object.
fn row_to_json(row: &SqliteRow) -> JsonValue {
    let mut map = serde_json::Map::new();

    for column in row.columns() {
        let column_name = column.name();
        map.insert(column_name.to_string(), extract_column_value(row, column_name));
    }

    JsonValue::Object(map)
}

/// Extracts a column value as a JSON value.
///
/// SQLite is dynamically typed, so several decodings are attempted in
/// order of likelihood.
fn extract_column_value(row: &SqliteRow, column_name: &str) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(column_name) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }

    // BLOB and other unsupported types are sampled as null
    JsonValue::Null
}
