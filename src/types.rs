//! Records exchanged with the storage collaborators and returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of one indexing run against a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Indexing,
    Ready,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Indexing => "indexing",
            RunStatus::Ready => "ready",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RunStatus::Pending),
            "indexing" => Some(RunStatus::Indexing),
            "ready" => Some(RunStatus::Ready),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingStats {
    /// Files the walker discovered
    pub total_files: usize,
    /// Files parsed, chunked and persisted this run
    pub indexed_files: usize,
    /// Files whose content hash matched the stored record
    pub skipped_files: usize,
    /// Files that could not be read, decoded or persisted
    pub failed_files: usize,
    /// Chunks handed to the vector store this run
    pub total_chunks: usize,
    /// Indexed files per detected language, `unknown` excluded
    pub languages: BTreeMap<String, usize>,
    /// One message per failed file
    #[serde(default)]
    pub errors: Vec<String>,
    /// Wall-clock duration of the run
    #[serde(default)]
    pub duration_ms: u64,
}

impl IndexingStats {
    /// Final status implied by the counters
    pub fn final_status(&self) -> RunStatus {
        if self.failed_files == 0 {
            RunStatus::Ready
        } else {
            RunStatus::Error
        }
    }
}

/// Per-file bookkeeping row, keyed by (repository_id, relative_path)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFileRecord {
    pub repository_id: i64,
    /// Absolute path at the time of indexing
    pub file_path: String,
    pub file_name: String,
    pub relative_path: String,
    /// SHA-256 hex digest of the raw bytes
    pub content_hash: String,
    pub language: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub is_indexed: bool,
    pub chunk_count: usize,
    /// Functions plus methods
    pub function_count: usize,
    pub class_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository-level mirror of the latest run's stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub repository_id: i64,
    pub status: RunStatus,
    pub total_files: usize,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_chunks: usize,
    pub languages: BTreeMap<String, usize>,
    pub updated_at: DateTime<Utc>,
}

impl RepositorySummary {
    pub fn from_stats(repository_id: i64, status: RunStatus, stats: &IndexingStats) -> Self {
        Self {
            repository_id,
            status,
            total_files: stats.total_files,
            indexed_files: stats.indexed_files,
            skipped_files: stats.skipped_files,
            failed_files: stats.failed_files,
            total_chunks: stats.total_chunks,
            languages: stats.languages.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Which chunk family a chunk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Entity,
    SlidingWindow,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Entity => "entity",
            ChunkKind::SlidingWindow => "sliding_window",
        }
    }
}

/// Metadata stored alongside each chunk in the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub repository_id: i64,
    /// Path relative to the repository root
    pub file_path: String,
    pub language: String,
    pub chunk_type: ChunkKind,
    /// 1-indexed, inclusive
    pub start_line: usize,
    /// 1-indexed, inclusive
    pub end_line: usize,
    /// Position of this chunk within the file's chunk list
    pub sequence: usize,
    pub file_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}
