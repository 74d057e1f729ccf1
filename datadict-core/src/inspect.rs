//! Schema inspection.
//!
//! Walks a connected source dialect and produces transient
//! [`TableDescriptor`]s: schema/table names, columns with normalized types
//! and sensitivity tags, and declared foreign keys. Enumeration failures
//! are contained at the unit that failed (one namespace, one table); a
//! single bad unit never aborts extraction of the rest of the source.

use crate::classify;
use crate::dialects::SourceDialect;
use crate::models::TableDescriptor;

/// Namespaces that are never inspected, across all supported dialects.
pub const SYSTEM_SCHEMAS: &[&str] = &[
    "information_schema",
    "pg_catalog",
    "pg_toast",
    "mysql",
    "performance_schema",
    "sys",
];

fn is_system_schema(schema: &str) -> bool {
    let lower = schema.to_lowercase();
    SYSTEM_SCHEMAS.iter().any(|s| *s == lower)
}

/// Extracts table descriptors for every visible, non-system table.
///
/// Failure policy:
/// - schema enumeration failure: logged, treated as an empty schema list;
/// - no accessible schemas: falls back to the dialect's default namespace;
/// - per-schema table enumeration failure: logged, schema skipped;
/// - per-table column enumeration failure: logged, table skipped;
/// - per-table foreign-key enumeration failure: logged, table kept with no
///   relationships.
pub async fn extract_tables(dialect: &dyn SourceDialect) -> Vec<TableDescriptor> {
    let schemas = match dialect.list_schemas().await {
        Ok(schemas) => schemas,
        Err(e) => {
            tracing::warn!("Failed to enumerate schemas: {}", e);
            Vec::new()
        }
    };

    let mut schemas: Vec<String> = schemas
        .into_iter()
        .filter(|s| !is_system_schema(s))
        .collect();

    if schemas.is_empty() {
        let fallback = dialect.default_schema();
        if fallback.is_empty() {
            tracing::warn!("Source lists no accessible schemas and has no default namespace");
            return Vec::new();
        }
        tracing::debug!(
            "Source lists no accessible schemas, falling back to '{}'",
            fallback
        );
        schemas = vec![fallback];
    }

    let mut descriptors = Vec::new();

    for schema in &schemas {
        let tables = match dialect.list_tables(schema).await {
            Ok(tables) => tables,
            Err(e) => {
                tracing::warn!("Skipping schema '{}': {}", schema, e);
                continue;
            }
        };

        for table in tables {
            match describe_table(dialect, schema, &table).await {
                Some(descriptor) => descriptors.push(descriptor),
                None => continue,
            }
        }
    }

    tracing::info!(
        "Extracted {} tables across {} schemas",
        descriptors.len(),
        schemas.len()
    );

    descriptors
}

async fn describe_table(
    dialect: &dyn SourceDialect,
    schema: &str,
    table: &str,
) -> Option<TableDescriptor> {
    let mut columns = match dialect.list_columns(schema, table).await {
        Ok(columns) => columns,
        Err(e) => {
            tracing::warn!("Skipping table '{}.{}': {}", schema, table, e);
            return None;
        }
    };

    for column in &mut columns {
        column.tags = classify::tags_for(&column.name);
    }

    let foreign_keys = match dialect.list_foreign_keys(schema, table).await {
        Ok(fks) => fks,
        Err(e) => {
            tracing::warn!(
                "Foreign key enumeration failed for '{}.{}', recording none: {}",
                schema,
                table,
                e
            );
            Vec::new()
        }
    };

    Some(TableDescriptor {
        schema_name: schema.to_string(),
        table_name: table.to_string(),
        columns,
        foreign_keys,
    })
}
