use crate::error::{ProviderError, StoreError};
use crate::models::{Chunk, RetrievedChunk};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Tokens in arrival order; the channel closes when generation ends.
pub type TokenStream = mpsc::Receiver<Result<String, ProviderError>>;

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    async fn delete(&self, namespace: &str, chunk_ids: &[String]) -> Result<(), StoreError>;

    async fn similarity_search(
        &self,
        namespace: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    async fn count(&self, namespace: &str) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn stream(&self, prompt: &str) -> Result<TokenStream, ProviderError>;
}
