use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::{Chunk, IngestionOptions};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `text` into windows of at most `max_chars` characters where each
/// window starts with the last `overlap_chars` characters of the previous one.
/// A window ends at the last space in its second half when there is one.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Ok(Vec::new());
    }
    if chars.len() <= config.max_chars {
        return Ok(vec![text.to_string()]);
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let hard_end = (start + config.max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            let lowest = start + config.overlap_chars.max(config.max_chars / 2) + 1;
            (lowest..hard_end)
                .rev()
                .find(|&position| chars[position].is_whitespace())
                .unwrap_or(hard_end)
        };

        pieces.push(chars[start..end].iter().collect::<String>());
        if end == chars.len() {
            break;
        }
        start = end - config.overlap_chars;
    }

    Ok(pieces)
}

/// Chunks every page of one document. `next_index` is the run-wide ordinal of
/// the first chunk produced; the ordinal after the last one is returned.
pub fn split_pages(
    source_path: &str,
    pages: &[PageText],
    options: &IngestionOptions,
    next_index: u64,
) -> Result<(Vec<Chunk>, u64), IngestError> {
    let config = ChunkingConfig::from(options);
    let mut chunks = Vec::new();
    let mut cursor = next_index;

    for page in pages {
        let normalized = normalize_whitespace(&page.text);
        for (position, content) in split_text(&normalized, config)?.into_iter().enumerate() {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(source_path, page.number, position, &content),
                content,
                source_path: source_path.to_string(),
                page_number: page.number,
                chunk_index: cursor,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok((chunks, cursor))
}

fn make_chunk_id(source_path: &str, page: u32, position: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update((position as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
