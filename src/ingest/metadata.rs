use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use super::walker::FileMetadata;

/// Stable chunk identifier: `{source}_{first 8 hex chars of SHA-256(content)}`.
///
/// Identical content from the same source always yields the same id, so re-running
/// the loader over an unchanged corpus reproduces the ids the graph was built with.
pub fn chunk_id(source: &str, content: &str) -> String {
    let hash = format!("{:x}", Sha256::digest(content.as_bytes()));
    format!("{}_{}", source, &hash[..8])
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid title regex"))
}

fn tags_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?mi)tags:\s*(.+)$").expect("valid tags regex"))
}

/// Title from the first `# ` header, else the file stem with `_` as spaces, title-cased.
pub fn extract_title(content: &str, relative_path: &str) -> String {
    if let Some(cap) = title_regex().captures(content) {
        return cap[1].trim().to_string();
    }

    let stem = Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.replace('_', " ")
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Tags from a `tags: a, b, c` line, if present.
pub fn extract_tags(content: &str) -> Option<Vec<String>> {
    tags_regex().captures(content).map(|cap| {
        cap[1]
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
}

/// Document-level metadata shared by every chunk of the file.
pub fn document_metadata(content: &str, file: &FileMetadata) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), Value::from(file.file_name.clone()));
    metadata.insert("file_path".to_string(), Value::from(file.relative_path.clone()));
    metadata.insert(
        "title".to_string(),
        Value::from(extract_title(content, &file.relative_path)),
    );
    if let Some(tags) = extract_tags(content) {
        metadata.insert("tags".to_string(), Value::from(tags));
    }
    metadata
}
