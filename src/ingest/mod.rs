//! Corpus loading: discover `.md` / `.txt` files, attach metadata, split into
//! stable-id chunks in a deterministic order.

pub mod walker;
pub mod metadata;
pub mod chunker;

pub use walker::{FileMetadata, discover_files};
pub use metadata::{chunk_id, document_metadata, extract_tags, extract_title};
pub use chunker::{Chunk, chunk_document, split_text};

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::error::Result;

/// Load and chunk every corpus file under `root`.
///
/// Files that cannot be read are logged and skipped; a missing `root` is an error.
pub fn load_chunks(root: &Path, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let start = std::time::Instant::now();
    let files = discover_files(root)?;
    let mut chunks = Vec::new();

    for file in &files {
        let content = match std::fs::read_to_string(&file.absolute_path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping {}: {}", file.relative_path, e);
                continue;
            }
        };

        let metadata = document_metadata(&content, file);
        let file_chunks = chunk_document(&content, &metadata, config)?;
        log::debug!("{}: {} chunks", file.relative_path, file_chunks.len());
        chunks.extend(file_chunks);
    }

    log::info!(
        "Loaded {} chunks from {} files in {:?}",
        chunks.len(),
        files.len(),
        start.elapsed()
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_chunks_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.md"), "# Payments\nPaymentRouter calls AuthService.").unwrap();
        fs::write(temp_dir.path().join("a.txt"), "AuthService issues tokens.").unwrap();

        let config = ChunkingConfig::default();
        let first = load_chunks(temp_dir.path(), &config).unwrap();
        let second = load_chunks(temp_dir.path(), &config).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].source(), "a.txt");
        assert_eq!(first[1].metadata["title"], "Payments");
        let ids: Vec<_> = first.iter().map(|c| c.id.clone()).collect();
        let ids_again: Vec<_> = second.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, ids_again);
    }

    #[test]
    fn test_load_chunks_skips_empty_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("empty.md"), "").unwrap();
        let chunks = load_chunks(temp_dir.path(), &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }
}
