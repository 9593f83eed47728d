use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{Chunk, CleanupMode, IndexingReport};
use crate::record_manager::RecordManager;
use crate::traits::VectorStore;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Writes chunks to a vector store, consulting the record manager so that
/// unchanged chunks are not embedded again and stale ones are removed.
pub struct IndexingPipeline<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    records: &'a RecordManager,
    cleanup: CleanupMode,
    batch_size: usize,
}

impl<'a> IndexingPipeline<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        records: &'a RecordManager,
    ) -> Self {
        Self {
            embedder,
            store,
            records,
            cleanup: CleanupMode::Incremental,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupMode) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn index(&self, chunks: &[Chunk]) -> Result<IndexingReport, IndexError> {
        let namespace = self.records.namespace();
        let run_start = self.records.get_time();
        let mut report = IndexingReport::default();

        let mut seen = HashSet::new();
        let mut run_groups = BTreeSet::new();
        let unique: Vec<&Chunk> = chunks
            .iter()
            .filter(|chunk| seen.insert(chunk.chunk_id.as_str()))
            .collect();

        for batch in unique.chunks(self.batch_size) {
            let keys: Vec<String> = batch.iter().map(|chunk| chunk.chunk_id.clone()).collect();
            let groups: Vec<String> = batch
                .iter()
                .map(|chunk| chunk.source_id().to_string())
                .collect();

            let exists = self.records.exists(&keys)?;
            let to_write: Vec<Chunk> = batch
                .iter()
                .zip(&exists)
                .filter(|(_, exists)| !**exists)
                .map(|(chunk, _)| (*chunk).clone())
                .collect();
            report.num_skipped += batch.len() - to_write.len();

            if !to_write.is_empty() {
                let texts: Vec<String> = to_write.iter().map(|chunk| chunk.content.clone()).collect();
                let embeddings = self.embedder.embed_documents(&texts).await?;
                if embeddings.len() != to_write.len() {
                    return Err(IndexError::EmbeddingCount {
                        chunks: to_write.len(),
                        embeddings: embeddings.len(),
                    });
                }
                self.store.upsert(namespace, &to_write, &embeddings).await?;
                report.num_added += to_write.len();
            }

            self.records.update(&keys, &groups, run_start)?;
            run_groups.extend(groups);

            debug!(
                namespace,
                batch = batch.len(),
                added = report.num_added,
                skipped = report.num_skipped,
                "indexed batch"
            );
        }

        // Stale keys are only known once every batch of the run has been stamped.
        let stale = match self.cleanup {
            CleanupMode::None => Vec::new(),
            CleanupMode::Incremental if run_groups.is_empty() => Vec::new(),
            CleanupMode::Incremental => {
                let groups: Vec<String> = run_groups.into_iter().collect();
                self.records.list_keys(Some(run_start), Some(groups.as_slice()))?
            }
            CleanupMode::Full => self.records.list_keys(Some(run_start), None)?,
        };
        report.num_deleted += self.remove(&stale).await?;

        info!(
            namespace,
            num_added = report.num_added,
            num_skipped = report.num_skipped,
            num_deleted = report.num_deleted,
            "indexing stats"
        );
        Ok(report)
    }

    async fn remove(&self, keys: &[String]) -> Result<usize, IndexError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete(self.records.namespace(), keys).await?;
        self.records.delete_keys(keys)?;
        Ok(keys.len())
    }
}
