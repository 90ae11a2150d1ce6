use super::{MetadataStore, StoredDocument, VectorStore, ensure_parallel};
use crate::types::{ChunkMetadata, IndexedFileRecord, RepositorySummary};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Process-local vector store
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, BTreeMap<String, StoredDocument>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
        ids: Vec<String>,
    ) -> Result<usize> {
        ensure_parallel(texts.len(), metadatas.len(), ids.len())?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let count = ids.len();
        for ((id, text), metadata) in ids.into_iter().zip(texts).zip(metadatas) {
            docs.insert(id.clone(), StoredDocument { id, text, metadata });
        }
        Ok(count)
    }

    async fn delete_documents(&self, collection: &str, ids: Vec<String>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| docs.remove(*id).is_some()).count())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, BTreeMap::len))
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Process-local metadata store
#[derive(Default)]
pub struct InMemoryMetadataStore {
    files: RwLock<BTreeMap<(i64, String), IndexedFileRecord>>,
    repositories: RwLock<HashMap<i64, RepositorySummary>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn find_file_record(
        &self,
        repository_id: i64,
        relative_path: &str,
    ) -> Result<Option<IndexedFileRecord>> {
        let files = self.files.read().await;
        Ok(files
            .get(&(repository_id, relative_path.to_string()))
            .cloned())
    }

    async fn upsert_file_record(&self, record: IndexedFileRecord) -> Result<()> {
        let mut files = self.files.write().await;
        files.insert((record.repository_id, record.relative_path.clone()), record);
        Ok(())
    }

    async fn update_repository_summary(&self, summary: RepositorySummary) -> Result<()> {
        let mut repositories = self.repositories.write().await;
        repositories.insert(summary.repository_id, summary);
        Ok(())
    }

    async fn repository_summary(&self, repository_id: i64) -> Result<Option<RepositorySummary>> {
        let repositories = self.repositories.read().await;
        Ok(repositories.get(&repository_id).cloned())
    }

    async fn list_file_records(&self, repository_id: i64) -> Result<Vec<IndexedFileRecord>> {
        let files = self.files.read().await;
        Ok(files
            .range((repository_id, String::new())..)
            .take_while(|((repo, _), _)| *repo == repository_id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
