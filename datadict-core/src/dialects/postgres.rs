//! PostgreSQL dialect implementation.
//!
//! Enumeration goes through `information_schema` with privilege filters so
//! the connection only reports objects it can actually read. Sampling uses
//! `row_to_json` so rows arrive as JSON objects without client-side type
//! mapping.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use super::SourceDialect;
use crate::error::{CatalogError, Result};
use crate::models::{ColumnDescriptor, ForeignKeyDescriptor, SourceKind, TableSample};

/// PostgreSQL implementation of the dialect capability interface.
pub struct PostgresDialect {
    pool: PgPool,
}

impl PostgresDialect {
    /// Connects to a PostgreSQL source.
    ///
    /// # Errors
    /// Returns a connection error if the pool cannot be established.
    pub async fn connect(connection_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(connection_url)
            .await
            .map_err(|e| CatalogError::connection_failed("Failed to connect to PostgreSQL", e))?;

        Ok(Self { pool })
    }

    fn quote_ident(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

#[async_trait]
impl SourceDialect for PostgresDialect {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        let schema_query = r#"
            SELECT schema_name
            FROM information_schema.schemata
            WHERE has_schema_privilege(schema_name, 'USAGE')
            ORDER BY schema_name
        "#;

        let rows = sqlx::query(schema_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::enumeration_failed("Failed to enumerate schemas", e))?;

        let mut schemas = Vec::with_capacity(rows.len());
        for row in rows {
            let schema_name: String = row.try_get("schema_name").map_err(|e| {
                CatalogError::enumeration_failed("Failed to parse schema name", e)
            })?;
            schemas.push(schema_name);
        }

        Ok(schemas)
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let tables_query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1
            AND table_type = 'BASE TABLE'
            AND has_table_privilege(quote_ident(table_schema) || '.' || quote_ident(table_name), 'SELECT')
            ORDER BY table_name
        "#;

        let rows = sqlx::query(tables_query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::enumeration_failed(
                    format!("Failed to enumerate tables in schema '{}'", schema),
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
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_schema = $1
            AND table_name = $2
            ORDER BY ordinal_position
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
                con.conname::text AS constraint_name,
                a.attname::text AS column_name,
                fns.nspname::text AS referenced_schema,
                fcl.relname::text AS referenced_table,
                fa.attname::text AS referenced_column
            FROM pg_constraint con
            JOIN pg_class cl ON con.conrelid = cl.oid
            JOIN pg_namespace ns ON cl.relnamespace = ns.oid
            JOIN pg_class fcl ON con.confrelid = fcl.oid
            JOIN pg_namespace fns ON fcl.relnamespace = fns.oid
            JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY(con.conkey)
            JOIN pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = ANY(con.confkey)
            WHERE con.contype = 'f'
            AND cl.relname = $1
            AND ns.nspname = $2
            AND array_position(con.conkey, a.attnum) = array_position(con.confkey, fa.attnum)
            ORDER BY con.conname, array_position(con.conkey, a.attnum)
        "#;

        let rows = sqlx::query(fk_query)
            .bind(table)
            .bind(schema)
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

        // Group rows by constraint name, preserving column order
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

    fn build_sample_query(&self, schema: &str, table: &str, limit: u32) -> String {
        format!(
            "SELECT row_to_json(t.*) AS row_data FROM {}.{} t LIMIT {}",
            Self::quote_ident(schema),
            Self::quote_ident(table),
            limit
        )
    }

    async fn sample_table(&self, schema: &str, table: &str, limit: u32) -> Result<TableSample> {
        let sample_query = self.build_sample_query(schema, table, limit);

        tracing::debug!("Sampling {}.{}: {}", schema, table, sample_query);

        let rows: Vec<JsonValue> = sqlx::query_scalar(&sample_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                CatalogError::profiling_failed(
                    format!("Failed to sample data from table '{}.{}'", schema, table),
                    e,
                )
            })?;

        let sample_size = rows.len() as u32;

        Ok(TableSample {
            schema_name: schema.to_string(),
            table_name: table.to_string(),
            rows,
            sample_size,
            collected_at: chrono::Utc::now(),
        })
    }

    fn kind(&self) -> SourceKind {
        SourceKind::PostgreSQL
    }

    fn default_schema(&self) -> String {
        "public".to_string()
    }
}
