//! File walking functionality for directory traversal

use crate::config::WalkerConfig;
use crate::error::PathError;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Enumerates candidate files under a repository root
///
/// A file is kept when none of its path segments is a denied directory name,
/// its extension is allowed (case-insensitive) and its size is within the limit.
pub struct FileWalker {
    pub(crate) root: PathBuf,
    pub(crate) max_file_size: u64,
    pub(crate) allowed_extensions: HashSet<String>,
    pub(crate) denied_directories: Arc<HashSet<String>>,
    pub(crate) respect_gitignore: bool,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>, max_file_size: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_size,
            allowed_extensions: HashSet::new(),
            denied_directories: Arc::new(HashSet::new()),
            respect_gitignore: false,
        }
    }

    /// Build a walker from a per-run policy
    pub fn from_config(root: impl AsRef<Path>, config: &WalkerConfig) -> Self {
        Self::new(root, config.max_file_size)
            .with_extensions(config.allowed_extensions.clone())
            .with_denied_directories(config.denied_directories.clone())
            .with_gitignore(config.respect_gitignore)
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_denied_directories(mut self, directories: Vec<String>) -> Self {
        self.denied_directories = Arc::new(directories.into_iter().collect());
        self
    }

    pub fn with_gitignore(mut self, respect_gitignore: bool) -> Self {
        self.respect_gitignore = respect_gitignore;
        self
    }

    /// Check the root before any file is visited
    pub fn validate_root(&self) -> Result<(), PathError> {
        if !self.root.exists() {
            return Err(PathError::NotFound(self.root.display().to_string()));
        }
        if !self.root.is_dir() {
            return Err(PathError::NotADirectory(self.root.display().to_string()));
        }
        Ok(())
    }

    /// Walk the directory and collect all eligible files, sorted by path
    pub fn walk(&self) -> Result<Vec<PathBuf>, PathError> {
        self.validate_root()?;

        let denied = Arc::clone(&self.denied_directories);
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .require_git(false)
            .filter_entry(move |entry| {
                entry.depth() == 0 || !denied.contains(&*entry.file_name().to_string_lossy())
            })
            .build();

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if self.has_denied_segment(path) {
                continue;
            }

            if !self.has_allowed_extension(path) {
                continue;
            }

            match fs::metadata(path) {
                Ok(metadata) if metadata.len() > self.max_file_size => {
                    tracing::debug!("Skipping large file: {:?}", path);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Skipping file without metadata {:?}: {}", path, e);
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        tracing::info!("Found {} files to index under {:?}", files.len(), self.root);
        Ok(files)
    }

    /// Check the extension against the allow-list
    pub(crate) fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| self.allowed_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Check every segment below the root against the deny-list
    pub(crate) fn has_denied_segment(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .any(|c| self.denied_directories.contains(&*c.as_os_str().to_string_lossy()))
    }
}
