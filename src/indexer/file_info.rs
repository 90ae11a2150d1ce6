//! Per-run view of a discovered source file

use super::fingerprint::content_hash;
use super::language::{Language, detect_language_for_path};
use std::path::{Component, Path, PathBuf};

/// A file read and fingerprinted during one run
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub language: Language,
    pub line_count: usize,
}

impl SourceFile {
    /// Describe `bytes` read from `path` under `root`
    pub fn from_bytes(root: &Path, path: &Path, bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        Self {
            path: path.to_path_buf(),
            relative_path: relative_path(root, path),
            size_bytes: bytes.len() as u64,
            content_hash: content_hash(bytes),
            language: detect_language_for_path(path),
            line_count: text.lines().count(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.relative_path.clone())
    }
}

/// Relative path with forward slashes so record keys are stable across platforms
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
