use crate::error::StoreError;
use crate::models::{Chunk, RetrievedChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>, vector_size: usize) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance when it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self.client.get(self.collection_url()).send().await?;
        match response.status() {
            status if status.is_success() => {
                let parsed: Value = response.json().await?;
                let existing = parsed
                    .pointer("/result/config/params/vectors/size")
                    .and_then(Value::as_u64);
                match existing {
                    Some(size) if size as usize != self.vector_size => {
                        Err(StoreError::Request(format!(
                            "collection {} has vector size {} but embedder produces {}",
                            self.collection, size, self.vector_size
                        )))
                    }
                    _ => Ok(()),
                }
            }
            StatusCode::NOT_FOUND => {
                let created = self
                    .client
                    .put(self.collection_url())
                    .json(&json!({
                        "vectors": { "size": self.vector_size, "distance": "Cosine" },
                    }))
                    .send()
                    .await?;
                check_status(created.status())?;
                info!(collection = %self.collection, size = self.vector_size, "created qdrant collection");
                Ok(())
            }
            status => Err(backend_error(status)),
        }
    }
}

/// Qdrant ids must be integers or UUIDs. Namespaces share one collection, so
/// the id covers the namespace as well as the chunk.
pub fn point_id(namespace: &str, chunk_id: &str) -> Uuid {
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update([0u8])
        .chain_update(chunk_id.as_bytes())
        .finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

fn namespace_filter(namespace: &str) -> Value {
    json!({ "must": [{ "key": "namespace", "match": { "value": namespace } }] })
}

fn check_status(status: StatusCode) -> Result<(), StoreError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(backend_error(status))
    }
}

fn backend_error(status: StatusCode) -> StoreError {
    StoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

fn hit_to_chunk(hit: &Value) -> RetrievedChunk {
    let text = |pointer: &str| {
        hit.pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let number = |pointer: &str| hit.pointer(pointer).and_then(Value::as_u64).unwrap_or(0);

    RetrievedChunk {
        chunk: Chunk {
            chunk_id: text("/payload/chunk_id"),
            content: text("/payload/content"),
            source_path: text("/payload/source_path"),
            page_number: number("/payload/page_number") as u32,
            chunk_index: number("/payload/chunk_index"),
        },
        score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
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

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != self.vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(namespace, &chunk.chunk_id),
                    "vector": embedding,
                    "payload": {
                        "namespace": namespace,
                        "chunk_id": chunk.chunk_id,
                        "source_path": chunk.source_path,
                        "page_number": chunk.page_number,
                        "chunk_index": chunk.chunk_index,
                        "content": chunk.content,
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        check_status(response.status())
    }

    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> Result<(), StoreError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = chunk_ids
            .iter()
            .map(|chunk_id| point_id(namespace, chunk_id))
            .collect();

        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&json!({ "points": ids }))
            .send()
            .await?;

        check_status(response.status())
    }

    async fn similarity_search(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if query_vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "filter": namespace_filter(namespace),
                "with_payload": true,
            }))
            .send()
            .await?;

        check_status(response.status())?;

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits.iter().map(hit_to_chunk).collect())
    }

    async fn count(&self, namespace: &str) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&json!({ "filter": namespace_filter(namespace), "exact": true }))
            .send()
            .await?;

        check_status(response.status())?;

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "count response without result.count".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_stable_and_namespace_scoped() {
        assert_eq!(point_id("ns/a", "chunk"), point_id("ns/a", "chunk"));
        assert_ne!(point_id("ns/a", "chunk"), point_id("ns/b", "chunk"));
        assert_ne!(point_id("ns/a", "chunk"), point_id("ns/a", "other"));
    }

    #[test]
    fn search_hits_map_back_to_chunks() {
        let hit = json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "score": 0.75,
            "payload": {
                "chunk_id": "abc",
                "content": "text",
                "source_path": "/tmp/a.pdf",
                "page_number": 3,
                "chunk_index": 9,
            }
        });

        let retrieved = hit_to_chunk(&hit);

        assert_eq!(retrieved.chunk.chunk_id, "abc");
        assert_eq!(retrieved.chunk.page_number, 3);
        assert_eq!(retrieved.chunk.chunk_index, 9);
        assert!((retrieved.score - 0.75).abs() < 1e-6);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_endpoint() {
        let store = QdrantStore::new("http://localhost:6333/", "docs", 4);
        assert_eq!(store.collection_url(), "http://localhost:6333/collections/docs");
    }
}
