//! Persistence collaborators: a chunk store and a bookkeeping store
//!
//! Both are injected into each run. Implementations must make writes to a
//! single key safe under concurrent runs; the indexer never locks across calls.

mod memory;
mod sqlite;

pub use memory::{InMemoryMetadataStore, InMemoryVectorStore};
pub use sqlite::SqliteStore;

use crate::types::{ChunkMetadata, IndexedFileRecord, RepositorySummary};
use anyhow::Result;

/// A chunk as held by a vector store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Chunk storage keyed by (collection, id)
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace documents; the three vectors are parallel
    async fn add_documents(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
        ids: Vec<String>,
    ) -> Result<usize>;

    /// Remove documents by id, ignoring ids that are absent
    async fn delete_documents(&self, collection: &str, ids: Vec<String>) -> Result<usize>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// All documents of a collection, ordered by id
    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>>;
}

/// Per-file and per-repository bookkeeping
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    async fn find_file_record(
        &self,
        repository_id: i64,
        relative_path: &str,
    ) -> Result<Option<IndexedFileRecord>>;

    /// Create the record, or replace the one with the same (repository, relative path)
    async fn upsert_file_record(&self, record: IndexedFileRecord) -> Result<()>;

    async fn update_repository_summary(&self, summary: RepositorySummary) -> Result<()>;

    async fn repository_summary(&self, repository_id: i64) -> Result<Option<RepositorySummary>>;

    /// Records of one repository, ordered by relative path
    async fn list_file_records(&self, repository_id: i64) -> Result<Vec<IndexedFileRecord>>;
}

/// Check that the parallel vectors passed to `add_documents` line up
pub(crate) fn ensure_parallel(texts: usize, metadatas: usize, ids: usize) -> Result<()> {
    if texts != metadatas || texts != ids {
        anyhow::bail!(
            "Mismatched document batch: {} texts, {} metadatas, {} ids",
            texts,
            metadatas,
            ids
        );
    }
    Ok(())
}
