use crate::chunking::{split_pages, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::extract_page_texts;
use crate::models::{Chunk, IngestionOptions, IngestionReport, SkippedPdf};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn load_folder_chunks(
    folder: &Path,
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    let report = load_folder_chunks_best_effort(folder, options)?;
    Ok(report.chunks)
}

/// Loads and splits every PDF under `folder`, skipping files that cannot be
/// read instead of failing the whole run.
pub fn load_folder_chunks_best_effort(
    folder: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    ChunkingConfig::from(options).validate()?;
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut chunks = Vec::new();
    let mut skipped_files = Vec::new();
    let mut cursor = 0u64;

    for path in files {
        let build_result = (|| {
            let source_path = source_path_of(&path)?;
            let pages = extract_page_texts(&path)?;
            split_pages(&source_path, &pages, options, cursor)
        })();

        match build_result {
            Ok((file_chunks, next_cursor)) => {
                cursor = next_cursor;
                chunks.extend(file_chunks);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        folder = %folder.display(),
        chunk_count = chunks.len(),
        skipped = skipped_files.len(),
        "loaded and split documents"
    );

    Ok(IngestionReport {
        chunks,
        skipped_files,
    })
}

fn source_path_of(path: &Path) -> Result<String, IngestError> {
    if path.file_name().is_none() {
        return Err(IngestError::MissingFileName(format!(
            "path missing filename: {}",
            path.display()
        )));
    }
    Ok(path.to_string_lossy().to_string())
}
