//! MySQL dialect implementation.
//!
//! MySQL treats the connected database as the single visible namespace:
//! `list_schemas` reports the current database and sample queries use
//! backtick quoting with no schema prefix. Identifier columns from
//! `INFORMATION_SCHEMA` are cast to CHAR to avoid VARBINARY decoding
//! issues on MySQL 8.0+.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row};

use super::SourceDialect;
use crate::error::{CatalogError, Result};
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor, SourceKind, TableSample};

/// MySQL implementation of the dialect capability interface.
pub struct MySqlDialect {
    pool: MySqlPool,
}

impl MySqlDialect {
    /// Connects to a MySQL source.
    ///
    /// # Errors
    /// Returns a connection error if the pool cannot be established.
    pub async fn connect(connection_url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(connection_url)
            .await
            .map_err(|e| CatalogError::connection_failed("Failed to connect to MySQL", e))?;

        Ok(Self { pool })
    }

    fn quote_ident(ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}

#[async_trait]
impl SourceDialect for MySqlDialect {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        // The connection is scoped to one database; that database is the
        // only namespace this dialect enumerates.
        let current: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatalogError::enumeration_failed("Failed to resolve current database", e))?;

        Ok(current.into_iter().collect())
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS table_name
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ?
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let rows = sqlx::query(tables_query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::enumeration_failed(
                    format!("Failed to enumerate tables in database '{}'", schema),
                    e,
                )
            })?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let table_name: String = row
                .try_get("table_name")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse table name", e))?;
            tables.push(table_name);
        }

        Ok(tables)
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let columns_query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(DATA_TYPE AS CHAR) AS data_type
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows = sqlx::query(columns_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::enumeration_failed(
                    format!("Failed to collect columns for table '{}.{}'", schema, table),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("column_name")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column name", e))?;
            let data_type: String = row
                .try_get("data_type")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column type", e))?;

            columns.push(ColumnDescriptor {
                name,
                data_type: data_type.to_lowercase(),
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
        let fk_query = r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(REFERENCED_TABLE_SCHEMA AS CHAR) AS referenced_schema,
                CAST(REFERENCED_TABLE_NAME AS CHAR) AS referenced_table,
                CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let rows = sqlx::query(fk_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::enumeration_failed(
                    format!(
                        "Failed to collect foreign keys for table '{}.{}'",
                        schema, table
                    ),
                    e,
                )
            })?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, ForeignKeyDescriptor> = HashMap::new();

        for row in rows {
            let constraint_name: String = row.try_get("constraint_name").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse constraint name", e)
            })?;
            let column: String = row
                .try_get("column_name")
                .map_err(|e| CatalogError::enumeration_failed("Failed to parse column name", e))?;
            let referenced_schema: Option<String> = row.try_get("referenced_schema").map_err(
                |e| CatalogError::enumeration_failed("Failed to parse referenced schema", e),
            )?;
            let referenced_table: String = row.try_get("referenced_table").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse referenced table", e)
            })?;
            let referenced_column: String = row.try_get("referenced_column").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse referenced column", e)
            })?;

            let entry = groups.entry(constraint_name.clone()).or_insert_with(|| {
                order.push(constraint_name);
                ForeignKeyDescriptor {
                    columns: Vec::new(),
                    referenced_schema: referenced_schema.unwrap_or_else(|| schema.to_string()),
                    referenced_table,
                    referenced_columns: Vec::new(),
                }
            });
            entry.columns.push(column);
            entry.referenced_columns.push(referenced_column);
        }

        Ok(order
            .into_iter()
            .filter_map(|name| groups.remove(&name))
            .collect())
    }

    fn build_sample_query(&self, _schema: &str, table: &str, limit: u32) -> String {
        // Backticks, no schema prefix: the connection is already scoped to
        // the database acting as the schema.
        format!("SELECT * FROM {} LIMIT {}", Self::quote_ident(table), limit)
    }

    async fn sample_table(&self, schema: &str, table: &str, limit: u32) -> Result<TableSample> {
        let sample_query = self.build_sample_query(schema, table, limit);

        tracing::debug!("Sampling {}.{}: {}", schema, table, sample_query);

        let rows = sqlx::query(&sample_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::profiling_failed(
                    format!("Failed to sample data from table '{}.{}'", schema, table),
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
        SourceKind::MySQL
    }

    fn default_schema(&self) -> String {
        // MySQL has no conventional shared namespace; an empty database
        // selection means there is nothing to enumerate.
        String::new()
    }
}

/// Converts a MySQL row into a JSON object.
fn row_to_json(row: &MySqlRow) -> JsonValue {
    let mut map = serde_json::Map::new();

    for column in row.columns() {
        let column_name = column.name();
        map.insert(column_name.to_string(), extract_column_value(row, column_name));
    }

    JsonValue::Object(map)
}

/// Extracts a column value as a JSON value, trying types in order of
/// likelihood.
fn extract_column_value(row: &MySqlRow, column_name: &str) -> JsonValue {
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
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(column_name) {
        return v
            .map(|ts| JsonValue::String(ts.to_rfc3339()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(column_name) {
        return v
            .map(|ts| JsonValue::String(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(column_name) {
        return v
            .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }

    // Unsupported type (BLOB and friends): sampled as null
    JsonValue::Null
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_quoting() {
        assert_eq!(MySqlDialect::quote_ident("orders"), "`orders`");
        assert_eq!(MySqlDialect::quote_ident("or`ders"), "`or``ders`");
    }
}
