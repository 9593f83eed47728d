use crate::error::StoreError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

type Namespace = HashMap<String, (Chunk, Vec<f32>)>;

/// Process-local store; entries live as long as the store value.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() || query.is_empty() {
        return 0.0;
    }

    let dot = query
        .iter()
        .zip(candidate)
        .map(|(left, right)| left * right)
        .sum::<f32>();
    let query_norm = query.iter().map(|value| value * value).sum::<f32>().sqrt();
    let candidate_norm = candidate.iter().map(|value| value * value).sum::<f32>().sqrt();
    let denom = query_norm * candidate_norm;
    if denom <= f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut namespaces = self.namespaces.write();
        let entries = namespaces.entry(namespace.to_string()).or_default();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            entries.insert(chunk.chunk_id.clone(), (chunk.clone(), embedding.clone()));
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> Result<(), StoreError> {
        let mut namespaces = self.namespaces.write();
        if let Some(entries) = namespaces.get_mut(namespace) {
            for chunk_id in chunk_ids {
                entries.remove(chunk_id);
            }
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let namespaces = self.namespaces.read();
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored = entries
            .values()
            .map(|(chunk, embedding)| RetrievedChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vector, embedding),
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.chunk.chunk_index.cmp(&right.chunk.chunk_index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, namespace: &str) -> Result<usize, StoreError> {
        Ok(self
            .namespaces
            .read()
            .get(namespace)
            .map(HashMap::len)
            .unwrap_or(0))
    }
}
