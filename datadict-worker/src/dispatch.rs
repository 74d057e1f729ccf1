//! Fire-and-forget run dispatch.
//!
//! Extraction requests are queued as bare source ids and consumed by a
//! bounded pool of workers. A request carries no reply channel: the
//! dispatcher's caller observes results only through the persisted records
//! and exported artifacts a run produces. Within one run tables are
//! processed sequentially; the pool only provides concurrency across
//! sources.

use std::sync::Arc;

use datadict_core::{ArtifactStore, CatalogStore, Pipeline, PipelineOptions, TextGenerator};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Shared collaborators handed to every worker.
pub struct Collaborators {
    pub store: Arc<dyn CatalogStore>,
    pub text: Arc<dyn TextGenerator>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub options: PipelineOptions,
}

/// Bounded worker pool consuming source-run requests from a queue.
pub struct Dispatcher {
    queue: mpsc::Sender<Uuid>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Starts `worker_count` workers over a bounded queue.
    pub fn start(worker_count: usize, collaborators: Collaborators) -> Self {
        let (queue, receiver) = mpsc::channel::<Uuid>(64);
        let receiver = Arc::new(Mutex::new(receiver));
        let collaborators = Arc::new(collaborators);

        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let collaborators = Arc::clone(&collaborators);

                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while receiving so idle
                        // workers do not serialize each other's runs.
                        let source_id = { receiver.lock().await.recv().await };
                        let Some(source_id) = source_id else {
                            break;
                        };

                        tracing::debug!("Worker {} picked up source {}", worker_id, source_id);

                        let pipeline = Pipeline::new(
                            collaborators.store.as_ref(),
                            collaborators.text.as_ref(),
                            collaborators.artifacts.as_ref(),
                            collaborators.options.clone(),
                        );

                        // Fire-and-forget: failures are logged, never returned
                        if let Err(e) = pipeline.run(source_id).await {
                            tracing::error!("Extraction run for {} failed: {}", source_id, e);
                        }
                    }
                })
            })
            .collect();

        Self { queue, workers }
    }

    /// Enqueues one source for extraction.
    ///
    /// Returns false if the dispatcher has shut down.
    pub async fn enqueue(&self, source_id: Uuid) -> bool {
        self.queue.send(source_id).await.is_ok()
    }

    /// Closes the queue and waits for in-flight runs to finish.
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task panicked: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use datadict_core::{
        InMemoryCatalog, QualityProfile, Result, Source, SourceKind, TableDescriptor,
    };

    struct StubText;

    #[async_trait]
    impl TextGenerator for StubText {
        async fn generate_summary(
            &self,
            _table: &TableDescriptor,
            _profile: &QualityProfile,
        ) -> Result<String> {
            Ok("stub".to_string())
        }
    }

    struct NullArtifacts;

    #[async_trait]
    impl ArtifactStore for NullArtifacts {
        async fn put_object(
            &self,
            _key: &str,
            _content_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn collaborators(store: Arc<InMemoryCatalog>) -> Collaborators {
        Collaborators {
            store,
            text: Arc::new(StubText),
            artifacts: Arc::new(NullArtifacts),
            options: PipelineOptions {
                pacing_delay_ms: 0,
                ..PipelineOptions::default()
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_drains_queue_on_shutdown() {
        let store = Arc::new(InMemoryCatalog::new());
        let source = store
            .create_source(Source::new("empty", SourceKind::SQLite, "sqlite::memory:"))
            .await
            .unwrap();

        let dispatcher = Dispatcher::start(2, collaborators(Arc::clone(&store)));
        assert!(dispatcher.enqueue(source.id).await);
        // A run for a missing source is logged, not surfaced
        assert!(dispatcher.enqueue(Uuid::new_v4()).await);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_reports_closed() {
        let store = Arc::new(InMemoryCatalog::new());
        let dispatcher = Dispatcher::start(1, collaborators(store));
        let queue = dispatcher.queue.clone();

        dispatcher.shutdown().await;
        assert!(queue.send(Uuid::new_v4()).await.is_err());
    }
}
