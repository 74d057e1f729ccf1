//! Artifact export.
//!
//! Each processed table is exported twice to the external object store: a
//! structured JSON payload (`metadata` + `profile` + `summary`) and a
//! rendered markdown data-dictionary document. Keys are hierarchical:
//! `<source>/<schema>/<table>.<ext>`. The pipeline requires no read-back
//! contract from the store.

use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions};

use crate::error::{CatalogError, Result};
use crate::models::TableMetadata;
use crate::sanitize::sanitize_json;

/// Put-object interface to the external artifact store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes one object under a hierarchical key.
    async fn put_object(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Artifact store backed by an `object_store` implementation
/// (local filesystem, in-memory, or a cloud bucket).
pub struct ObjectStoreArtifacts {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreArtifacts {
    /// Wraps an object store client. The client may be reused across
    /// tables within a run.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifacts {
    async fn put_object(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let path = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions::from(attributes);

        self.store
            .put_opts(&path, bytes.into(), options)
            .await
            .map_err(|e| {
                CatalogError::artifact_failed(format!("Failed to put object '{}'", key), e)
            })?;

        Ok(())
    }
}

/// Builds the hierarchical artifact key for one table.
pub fn artifact_key(source_name: &str, schema: &str, table: &str, extension: &str) -> String {
    format!("{}/{}/{}.{}", source_name, schema, table, extension)
}

/// Builds the structured JSON artifact for one table.
///
/// The payload passes through the generic sanitizer so it is always
/// representable in strict JSON regardless of how it was assembled.
pub fn build_json_artifact(record: &TableMetadata) -> Result<Vec<u8>> {
    let payload = serde_json::json!({
        "metadata": {
            "schema_name": record.schema_name,
            "table_name": record.table_name,
            "columns": record.columns,
            "relationships": record.relationships,
        },
        "profile": record.quality,
        "summary": record.summary,
    });

    serde_json::to_vec_pretty(&sanitize_json(payload)).map_err(|e| {
        CatalogError::Serialization {
            context: format!(
                "Failed to serialize artifact for '{}.{}'",
                record.schema_name, record.table_name
            ),
            source: e,
        }
    })
}

/// Renders the markdown data-dictionary document for one table.
pub fn render_markdown(source_name: &str, record: &TableMetadata) -> String {
    let mut doc = String::new();

    doc.push_str(&format!(
        "# {}.{}.{}\n\n",
        source_name, record.schema_name, record.table_name
    ));
    doc.push_str(&format!("**Source:** {}\n", source_name));
    doc.push_str(&format!(
        "**Last updated:** {}\n\n",
        record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    doc.push_str("## Summary\n\n");
    doc.push_str(&record.summary);
    doc.push_str("\n\n");

    doc.push_str("## Columns\n\n");
    doc.push_str("| Name | Type | Tags |\n|------|------|------|\n");
    for column in &record.columns {
        let tags: Vec<String> = column.tags.iter().map(|t| t.to_string()).collect();
        doc.push_str(&format!(
            "| {} | {} | {} |\n",
            column.name,
            column.data_type,
            tags.join(", ")
        ));
    }
    doc.push('\n');

    if !record.relationships.is_empty() {
        doc.push_str("## Relationships\n\n");
        for fk in &record.relationships {
            doc.push_str(&format!(
                "- ({}) → {}.{} ({})\n",
                fk.columns.join(", "),
                fk.referenced_schema,
                fk.referenced_table,
                fk.referenced_columns.join(", ")
            ));
        }
        doc.push('\n');
    }

    doc.push_str("## Quality Profile\n\n");
    if record.quality.empty_table {
        doc.push_str("_Table was empty at profiling time._\n");
    } else {
        doc.push_str(
            "| Column | Completeness | Uniqueness | Distinct |\n|--------|--------------|------------|----------|\n",
        );
        for (name, stats) in &record.quality.columns {
            doc.push_str(&format!(
                "| {} | {:.1}% | {:.1}% | {} |\n",
                name,
                stats.completeness * 100.0,
                stats.uniqueness * 100.0,
                stats.distinct_count
            ));
        }
    }

    doc
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::classify::SensitivityTag;
    use crate::models::{ColumnDescriptor, ColumnStats, QualityProfile};
    use chrono::Utc;
    use object_store::memory::InMemory;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn record() -> TableMetadata {
        let mut columns = BTreeMap::new();
        columns.insert(
            "email".to_string(),
            ColumnStats {
                completeness: 0.75,
                uniqueness: 0.9,
                distinct_count: 9,
                data_type: "text".to_string(),
                numeric: None,
                freshness: None,
                top_values: None,
            },
        );

        TableMetadata {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            columns: vec![ColumnDescriptor {
                name: "email".to_string(),
                data_type: "text".to_string(),
                tags: BTreeSet::from([SensitivityTag::Contact]),
            }],
            relationships: Vec::new(),
            summary: "Holds registered users.".to_string(),
            quality: QualityProfile::from_columns(columns),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_artifact_key_format() {
        assert_eq!(
            artifact_key("warehouse", "public", "users", "json"),
            "warehouse/public/users.json"
        );
    }

    #[test]
    fn test_json_artifact_shape() {
        let bytes = build_json_artifact(&record()).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(payload["metadata"]["table_name"], "users");
        assert_eq!(payload["summary"], "Holds registered users.");
        assert!(payload["profile"]["columns"]["email"].is_object());
    }

    #[test]
    fn test_markdown_renders_columns_and_profile() {
        let doc = render_markdown("warehouse", &record());

        assert!(doc.contains("# warehouse.public.users"));
        assert!(doc.contains("| email | text | Contact |"));
        assert!(doc.contains("Holds registered users."));
        assert!(doc.contains("| email | 75.0% | 90.0% | 9 |"));
    }

    #[test]
    fn test_markdown_empty_table_sentinel() {
        let mut record = record();
        record.quality = QualityProfile::empty_table();
        let doc = render_markdown("warehouse", &record);

        assert!(doc.contains("_Table was empty at profiling time._"));
    }

    #[tokio::test]
    async fn test_put_object_via_memory_store() {
        let inner = Arc::new(InMemory::new());
        let artifacts = ObjectStoreArtifacts::new(inner.clone());

        artifacts
            .put_object("warehouse/public/users.json", "application/json", b"{}".to_vec())
            .await
            .unwrap();

        let stored = inner
            .get(&ObjectPath::from("warehouse/public/users.json"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), b"{}");
    }
}
