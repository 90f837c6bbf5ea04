use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{GraphRagError, Result};

/// Metadata for a discovered corpus file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_name: String,
    pub extension: String,
}

/// Discover corpus files (`.md`, `.txt`, case-insensitive) under `root`.
///
/// Results are sorted by relative path so the chunk sequence handed to the graph
/// builder is the same on every run.
pub fn discover_files(root: &Path) -> Result<Vec<FileMetadata>> {
    if !root.is_dir() {
        return Err(GraphRagError::Config(format!(
            "Data directory not found: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !matches!(extension.as_str(), "md" | "txt") {
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| GraphRagError::Config(
                format!("Failed to compute relative path for: {}", path.display())
            ))?
            .to_string_lossy()
            .replace('\\', "/");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        files.push(FileMetadata {
            relative_path,
            absolute_path: path.to_path_buf(),
            file_name,
            extension,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::info!("Discovered {} files in {}", files.len(), root.display());
    Ok(files)
}
