use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub content: String,
    pub source_path: String,
    pub page_number: u32,
    pub chunk_index: u64,
}

impl Chunk {
    /// Group key used by the record manager.
    pub fn source_id(&self) -> &str {
        &self.source_path
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Citation {
    pub path: String,
    pub page: u32,
    pub display_name: String,
}

impl Citation {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            path: chunk.source_path.clone(),
            page: chunk.page_number,
            display_name: display_name(&chunk.source_path),
        }
    }

    pub fn label(&self) -> String {
        format!("{}, page {}", self.display_name, self.page)
    }
}

/// Last component of a path written with either separator.
pub fn display_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(path)
        .to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CleanupMode {
    None,
    #[default]
    Incremental,
    Full,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexingReport {
    pub num_added: usize,
    pub num_skipped: usize,
    pub num_deleted: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: crate::config::DEFAULT_CHUNK_SIZE,
            chunk_overlap_chars: crate::config::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub skipped_files: Vec<SkippedPdf>,
}
