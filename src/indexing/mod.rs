//! One end-to-end indexing run over a repository directory
//!
//! walk → read → fingerprint → compare → parse → chunk → persist → aggregate.
//! Files are processed strictly one after another; a failure on one file is
//! recorded and the run moves on.

use crate::config::Config;
use crate::error::{FileError, IndexerError, PersistenceError};
use crate::indexer::{
    AstParser, CodeChunk, CodeChunker, FileWalker, GrammarRegistry, Language, ParsedSource,
    SourceFile, chunk_id,
};
use crate::store::{MetadataStore, VectorStore};
use crate::types::{IndexedFileRecord, IndexingStats, RepositorySummary, RunStatus};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;

/// Drives indexing runs for a single repository
///
/// Instances for different repositories share nothing but the injected stores
/// and the grammar registry, so they can run concurrently.
pub struct RepositoryIndexer {
    repository_id: i64,
    config: Config,
    vector_store: Arc<dyn VectorStore>,
    metadata_store: Arc<dyn MetadataStore>,
    registry: Arc<GrammarRegistry>,
}

/// How a single file was classified
#[derive(Debug)]
enum FileOutcome {
    Indexed { language: Language, chunks: usize },
    Unchanged,
}

/// Entities and chunks computed off the async runtime
struct Analysis {
    parsed: ParsedSource,
    chunks: Vec<CodeChunk>,
}

impl RepositoryIndexer {
    pub fn new(
        repository_id: i64,
        config: Config,
        vector_store: Arc<dyn VectorStore>,
        metadata_store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            repository_id,
            config,
            vector_store,
            metadata_store,
            registry: Arc::new(GrammarRegistry::new()),
        }
    }

    /// Share a grammar registry between indexers instead of building one each
    pub fn with_registry(mut self, registry: Arc<GrammarRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn repository_id(&self) -> i64 {
        self.repository_id
    }

    /// Vector-store collection holding this repository's chunks
    pub fn collection_name(&self) -> String {
        self.config.storage.collection_name(self.repository_id)
    }

    /// Index every eligible file under `root`
    ///
    /// A missing or non-directory root fails the run before any status is
    /// written. File-level errors are counted in the returned stats, and the
    /// final status is `ready` iff no file failed. Any other error, such as a
    /// dead worker task or a failed summary write, marks the run `error` and
    /// is returned.
    pub async fn index_directory(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<IndexingStats, IndexerError> {
        let started = Instant::now();
        let root = root.as_ref().to_path_buf();

        let walker = FileWalker::from_config(&root, &self.config.walker);
        walker.validate_root()?;

        tracing::info!(
            "Indexing repository {} from {:?}",
            self.repository_id,
            root
        );

        let files = task::spawn_blocking(move || walker.walk())
            .await
            .map_err(|e| IndexerError::other(format!("File walk task failed: {}", e)))??;

        let mut stats = IndexingStats {
            total_files: files.len(),
            ..Default::default()
        };
        self.write_summary(RunStatus::Indexing, &stats).await?;

        let chunker = CodeChunker::from_config(&self.config.chunking);
        let mut parser = Some(AstParser::new(Arc::clone(&self.registry)));
        let collection = self.collection_name();

        for path in &files {
            match self
                .index_file(&root, path, &collection, &chunker, &mut parser)
                .await
            {
                Ok(FileOutcome::Indexed { language, chunks }) => {
                    stats.indexed_files += 1;
                    stats.total_chunks += chunks;
                    if !language.is_unknown() {
                        *stats
                            .languages
                            .entry(language.as_str().to_string())
                            .or_insert(0) += 1;
                    }
                }
                Ok(FileOutcome::Unchanged) => {
                    stats.skipped_files += 1;
                }
                Err(e) if e.is_file_level() => {
                    tracing::warn!("Failed to index {:?}: {}", path, e);
                    stats.failed_files += 1;
                    stats.errors.push(format!("{}: {}", path.display(), e));
                }
                Err(e) => {
                    tracing::error!("Aborting run for repository {}: {}", self.repository_id, e);
                    stats.failed_files += 1;
                    stats.errors.push(format!("{}: {}", path.display(), e));
                    stats.duration_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    self.write_summary(RunStatus::Error, &stats).await?;
                    return Err(e);
                }
            }
        }

        stats.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status = stats.final_status();
        self.write_summary(status, &stats).await?;

        tracing::info!(
            "Indexing complete for repository {}: {}/{} files indexed, {} skipped, {} failed, {} chunks ({} ms)",
            self.repository_id,
            stats.indexed_files,
            stats.total_files,
            stats.skipped_files,
            stats.failed_files,
            stats.total_chunks,
            stats.duration_ms
        );

        Ok(stats)
    }

    async fn write_summary(
        &self,
        status: RunStatus,
        stats: &IndexingStats,
    ) -> Result<(), IndexerError> {
        let summary = RepositorySummary::from_stats(self.repository_id, status, stats);
        self.metadata_store
            .update_repository_summary(summary)
            .await
            .map_err(|e| PersistenceError::MetadataStore(format!("{:#}", e)))?;
        tracing::debug!("Repository {} is now {}", self.repository_id, status);
        Ok(())
    }

    async fn index_file(
        &self,
        root: &Path,
        path: &Path,
        collection: &str,
        chunker: &CodeChunker,
        parser: &mut Option<AstParser>,
    ) -> Result<FileOutcome, IndexerError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| FileError::ReadFailed {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let file = SourceFile::from_bytes(root, path, &bytes);

        let existing = self
            .metadata_store
            .find_file_record(self.repository_id, &file.relative_path)
            .await
            .map_err(|e| PersistenceError::MetadataStore(format!("{:#}", e)))?;

        if let Some(record) = &existing
            && record.content_hash == file.content_hash
        {
            tracing::debug!("Skipping unchanged file: {}", file.relative_path);
            return Ok(FileOutcome::Unchanged);
        }

        let content = String::from_utf8(bytes)
            .map_err(|_| FileError::Decode(file.relative_path.clone()))?;

        let analysis = self.analyze(&file, content, chunker, parser).await?;
        let chunk_count = analysis.chunks.len();

        // Ids past the new chunk count would otherwise survive from the previous version
        if let Some(record) = &existing
            && record.chunk_count > chunk_count
        {
            let stale: Vec<String> = (chunk_count..record.chunk_count)
                .map(|seq| chunk_id(self.repository_id, &file.relative_path, seq))
                .collect();
            self.vector_store
                .delete_documents(collection, stale)
                .await
                .map_err(|e| PersistenceError::VectorStore(format!("{:#}", e)))?;
        }

        if !analysis.chunks.is_empty() {
            let mut texts = Vec::with_capacity(chunk_count);
            let mut metadatas = Vec::with_capacity(chunk_count);
            let mut ids = Vec::with_capacity(chunk_count);
            for chunk in analysis.chunks {
                ids.push(chunk_id(
                    self.repository_id,
                    &file.relative_path,
                    chunk.metadata.sequence,
                ));
                texts.push(chunk.content);
                metadatas.push(chunk.metadata);
            }

            self.vector_store
                .add_documents(collection, texts, metadatas, ids)
                .await
                .map_err(|e| PersistenceError::VectorStore(format!("{:#}", e)))?;
        }

        let now = Utc::now();
        let record = IndexedFileRecord {
            repository_id: self.repository_id,
            file_path: file.path.display().to_string(),
            file_name: file.file_name(),
            relative_path: file.relative_path.clone(),
            content_hash: file.content_hash.clone(),
            language: file.language.as_str().to_string(),
            size_bytes: file.size_bytes,
            line_count: file.line_count,
            is_indexed: true,
            chunk_count,
            function_count: analysis.parsed.function_count(),
            class_count: analysis.parsed.class_count(),
            created_at: existing.as_ref().map_or(now, |r| r.created_at),
            updated_at: now,
        };

        self.metadata_store
            .upsert_file_record(record)
            .await
            .map_err(|e| PersistenceError::MetadataStore(format!("{:#}", e)))?;

        tracing::debug!(
            "Indexed {} ({}, {} chunks)",
            file.relative_path,
            file.language,
            chunk_count
        );

        Ok(FileOutcome::Indexed {
            language: file.language,
            chunks: chunk_count,
        })
    }

    /// Parse and chunk on the blocking pool
    ///
    /// The parser travels into the task and back; if the task dies a fresh one
    /// is built for the next file.
    async fn analyze(
        &self,
        file: &SourceFile,
        content: String,
        chunker: &CodeChunker,
        parser: &mut Option<AstParser>,
    ) -> Result<Analysis, IndexerError> {
        let mut owned = parser
            .take()
            .unwrap_or_else(|| AstParser::new(Arc::clone(&self.registry)));
        let file = file.clone();
        let chunker = *chunker;
        let repository_id = self.repository_id;

        let (owned, analysis) = task::spawn_blocking(move || {
            let parsed = extract(&mut owned, &file, &content);
            let chunks = chunker.chunk_file(&file, &content, repository_id, &parsed.entities);
            (owned, Analysis { parsed, chunks })
        })
        .await
        .map_err(|e| IndexerError::other(format!("Analysis task failed: {}", e)))?;

        *parser = Some(owned);
        Ok(analysis)
    }
}

/// Entities and imports, or nothing when the language has no grammar or fails to parse
fn extract(parser: &mut AstParser, file: &SourceFile, content: &str) -> ParsedSource {
    if !parser.registry().supports(file.language) {
        return ParsedSource::default();
    }

    match parser.parse(file.language, content.as_bytes()) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(
                "Entity extraction failed for {}, using sliding windows only: {}",
                file.relative_path,
                e
            );
            ParsedSource::default()
        }
    }
}

/// Convenience for callers that only have a path
pub async fn index_repository(
    repository_id: i64,
    root: impl Into<PathBuf>,
    config: Config,
    vector_store: Arc<dyn VectorStore>,
    metadata_store: Arc<dyn MetadataStore>,
) -> Result<IndexingStats, IndexerError> {
    RepositoryIndexer::new(repository_id, config, vector_store, metadata_store)
        .index_directory(root.into())
        .await
}

#[cfg(test)]
mod tests;
