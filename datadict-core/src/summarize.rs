//! Narrative summary generation.
//!
//! The text-generation capability is an external collaborator: the
//! pipeline depends on the [`TextGenerator`] trait and maps any failure to
//! a fixed placeholder rather than aborting a table. Two call shapes are
//! exposed over the same capability: a synchronous form used for the
//! persisted summary, and a streaming form yielding text fragments for
//! interactive use.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{CatalogError, Result};
use crate::models::{QualityProfile, TableDescriptor};

/// Fixed text substituted when summary generation fails.
pub const SUMMARY_PLACEHOLDER: &str = "Summary unavailable (text generation failed).";

/// Stream of narrative text fragments.
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// External text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a complete narrative summary for one table.
    async fn generate_summary(
        &self,
        table: &TableDescriptor,
        profile: &QualityProfile,
    ) -> Result<String>;

    /// Streams the summary as text fragments.
    ///
    /// The default implementation wraps the synchronous form in a
    /// single-chunk stream for backends without incremental output.
    async fn stream_summary(
        &self,
        table: &TableDescriptor,
        profile: &QualityProfile,
    ) -> Result<TextChunkStream> {
        let summary = self.generate_summary(table, profile).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok::<_, CatalogError>(summary)
        })))
    }
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct LlmSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmSummarizer {
    /// Creates a summarizer against an OpenAI-compatible API.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn build_prompt(table: &TableDescriptor, profile: &QualityProfile) -> String {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let tags: Vec<String> = c.tags.iter().map(|t| t.to_string()).collect();
                if tags.is_empty() {
                    format!("- {} ({})", c.name, c.data_type)
                } else {
                    format!("- {} ({}) [{}]", c.name, c.data_type, tags.join(", "))
                }
            })
            .collect();

        let relationships: Vec<String> = table
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "- ({}) references {}.{} ({})",
                    fk.columns.join(", "),
                    fk.referenced_schema,
                    fk.referenced_table,
                    fk.referenced_columns.join(", ")
                )
            })
            .collect();

        let profile_json =
            serde_json::to_string_pretty(profile).unwrap_or_else(|_| "{}".to_string());

        format!(
            "You are a senior data engineer. Write a business-friendly summary for the following table.\n\
             Table: {}\n\
             Columns:\n{}\n\
             Relationships:\n{}\n\
             Quality profile:\n{}\n\n\
             The summary should cover:\n\
             1. The likely purpose of the table.\n\
             2. Key business metrics that can be derived from it.\n\
             3. Usage recommendations, including any data-quality caveats.",
            table.qualified_name(),
            columns.join("\n"),
            if relationships.is_empty() {
                "- none declared".to_string()
            } else {
                relationships.join("\n")
            },
            profile_json
        )
    }

    fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a precise technical writer for a data catalog."
                },
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.2,
            "max_tokens": 1000,
            "stream": stream,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmSummarizer {
    async fn generate_summary(
        &self,
        table: &TableDescriptor,
        profile: &QualityProfile,
    ) -> Result<String> {
        let prompt = Self::build_prompt(table, profile);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(&prompt, false))
            .send()
            .await
            .map_err(|e| {
                CatalogError::summarization_failed(format!("API call failed: {}", e))
            })?;

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            CatalogError::summarization_failed(format!("Failed to parse API response: {}", e))
        })?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                CatalogError::summarization_failed("No content in API response".to_string())
            })
    }

    async fn stream_summary(
        &self,
        table: &TableDescriptor,
        profile: &QualityProfile,
    ) -> Result<TextChunkStream> {
        let prompt = Self::build_prompt(table, profile);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(&prompt, true))
            .send()
            .await
            .map_err(|e| {
                CatalogError::summarization_failed(format!("API call failed: {}", e))
            })?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(16);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(CatalogError::summarization_failed(format!(
                                "Stream read failed: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Server-sent events: one "data: ..." payload per line
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if payload == "[DONE]" {
                        return;
                    }

                    if let Ok(event) = serde_json::from_str::<serde_json::Value>(payload)
                        && let Some(fragment) = event["choices"][0]["delta"]["content"].as_str()
                        && !fragment.is_empty()
                        && tx.send(Ok(fragment.to_string())).await.is_err()
                    {
                        // Receiver dropped; stop relaying
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ColumnDescriptor;
    use std::collections::BTreeSet;

    fn table() -> TableDescriptor {
        TableDescriptor {
            schema_name: "public".to_string(),
            table_name: "users".to_string(),
            columns: vec![ColumnDescriptor {
                name: "email".to_string(),
                data_type: "text".to_string(),
                tags: BTreeSet::from([crate::classify::SensitivityTag::Contact]),
            }],
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn test_prompt_includes_table_columns_and_tags() {
        let prompt = LlmSummarizer::build_prompt(&table(), &QualityProfile::default());
        assert!(prompt.contains("public.users"));
        assert!(prompt.contains("email (text) [Contact]"));
        assert!(prompt.contains("none declared"));
    }

    #[test]
    fn test_request_body_shape() {
        let summarizer = LlmSummarizer::new("http://localhost", "key", "test-model");
        let body = summarizer.request_body("hello", true);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_default_stream_wraps_synchronous_form() {
        struct Fixed;

        #[async_trait]
        impl TextGenerator for Fixed {
            async fn generate_summary(
                &self,
                _table: &TableDescriptor,
                _profile: &QualityProfile,
            ) -> Result<String> {
                Ok("a fixed summary".to_string())
            }
        }

        let mut stream = Fixed
            .stream_summary(&table(), &QualityProfile::default())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "a fixed summary");
        assert!(stream.next().await.is_none());
    }
}
