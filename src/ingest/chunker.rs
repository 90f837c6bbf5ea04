use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::ChunkingConfig;
use crate::error::{GraphRagError, Result};
use super::metadata::chunk_id;

/// Minimal retrievable unit of document text.
///
/// `embedding` is empty until the retriever's construction pass fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Build a chunk whose id is derived from `metadata["source"]` and the content.
    pub fn new(content: impl Into<String>, metadata: BTreeMap<String, Value>) -> Self {
        let content = content.into();
        let source = metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        Self {
            id: chunk_id(&source, &content),
            content,
            metadata,
            embedding: None,
        }
    }

    /// Build a chunk with a caller-supplied id and no metadata.
    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
            embedding: None,
        }
    }

    /// Source file name, or `"unknown"`.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

/// Split one document into chunks, stamping `chunk_index` / `total_chunks`.
pub fn chunk_document(
    content: &str,
    metadata: &BTreeMap<String, Value>,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    let pieces = split_text(content, config.chunk_size, config.chunk_overlap)?;
    let total = pieces.len();

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| {
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("chunk_index".to_string(), Value::from(index));
            chunk_metadata.insert("total_chunks".to_string(), Value::from(total));
            Chunk::new(piece, chunk_metadata)
        })
        .collect())
}

/// Split text into character windows of `size` bytes with `overlap`.
///
/// Windows end on whitespace or sentence punctuation found in their last 20% when
/// possible. All slicing happens on UTF-8 character boundaries.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let size = size.max(1);
    let mut chunks = Vec::new();

    let find_char_boundary = |byte_pos: usize| -> usize {
        if byte_pos >= text.len() {
            return text.len();
        }
        if text.is_char_boundary(byte_pos) {
            return byte_pos;
        }
        (0..byte_pos).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
    };

    let mut start_byte = 0;

    while start_byte < text.len() {
        start_byte = find_char_boundary(start_byte);

        let end_byte = find_char_boundary((start_byte + size).min(text.len()));
        // A window narrower than one character would never advance.
        let end_byte = if end_byte <= start_byte {
            text[start_byte..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start_byte + i)
                .unwrap_or(text.len())
        } else {
            end_byte
        };

        let chunk_end_byte = if end_byte < text.len() {
            let search_start_byte = find_char_boundary(end_byte.saturating_sub(size / 5).max(start_byte));

            text.get(search_start_byte..end_byte)
                .and_then(|search_text| {
                    search_text
                        .char_indices()
                        .rev()
                        .find(|(_, c)| c.is_whitespace() || matches!(c, '.' | '!' | '?'))
                        .map(|(offset, c)| search_start_byte + offset + c.len_utf8())
                })
                .filter(|&boundary| boundary > start_byte)
                .unwrap_or(end_byte)
        } else {
            end_byte
        };

        let piece = text.get(start_byte..chunk_end_byte).ok_or_else(|| {
            GraphRagError::Parse(format!(
                "Failed to slice text at byte boundaries: start={}, end={}, len={}",
                start_byte,
                chunk_end_byte,
                text.len()
            ))
        })?;

        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if chunk_end_byte >= text.len() {
            break;
        }

        let new_start_byte = find_char_boundary(chunk_end_byte.saturating_sub(overlap));
        start_byte = if new_start_byte <= start_byte || new_start_byte >= chunk_end_byte {
            chunk_end_byte
        } else {
            new_start_byte
        };
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        }
    }

    #[test]
    fn test_split_text_short_text_single_chunk() {
        let chunks = split_text("AuthService issues tokens.", 100, 20).unwrap();
        assert_eq!(chunks, vec!["AuthService issues tokens.".to_string()]);
    }

    #[test]
    fn test_split_text_respects_size_and_overlaps() {
        let text = "word ".repeat(100);
        let chunks = split_text(&text, 100, 20).unwrap();

        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
            assert!(chunk.split_whitespace().all(|w| w == "word"), "split mid-word: {chunk}");
        }
        // Overlap repeats text, so the pieces cover more words than the input holds.
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert!(words > 100);
    }

    #[test]
    fn test_split_text_utf8_safe() {
        let text = "é".repeat(300);
        let chunks = split_text(&text, 33, 5).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == 'é')));
    }

    #[test]
    fn test_split_text_empty() {
        assert!(split_text("", 100, 20).unwrap().is_empty());
        assert!(split_text("   \n ", 100, 20).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_document_stamps_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), Value::from("auth.md"));
        let text = "AuthService depends on TokenService. ".repeat(10);

        let chunks = chunk_document(&text, &metadata, &config()).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata["chunk_index"], i);
            assert_eq!(chunk.metadata["total_chunks"], chunks.len());
            assert!(chunk.id.starts_with("auth.md_"));
            assert_eq!(chunk.source(), "auth.md");
            assert!(chunk.embedding.is_none());
        }
    }

    #[test]
    fn test_chunk_without_source_uses_unknown() {
        let chunk = Chunk::new("text", BTreeMap::new());
        assert!(chunk.id.starts_with("unknown_"));
        assert_eq!(chunk.source(), "unknown");
    }
}
