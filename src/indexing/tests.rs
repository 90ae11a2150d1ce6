use super::*;
use crate::error::PathError;
use crate::store::{InMemoryMetadataStore, InMemoryVectorStore, StoredDocument};
use crate::types::ChunkKind;
use anyhow::Result;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

const PYTHON_SOURCE: &str = r#"import os


class Greeter:
    """Says hello."""

    def greet(self, name):
        return f"Hello, {name}"


def main():
    Greeter().greet("world")
"#;

struct Harness {
    vectors: Arc<InMemoryVectorStore>,
    metadata: Arc<InMemoryMetadataStore>,
}

impl Harness {
    fn new() -> Self {
        Self {
            vectors: Arc::new(InMemoryVectorStore::new()),
            metadata: Arc::new(InMemoryMetadataStore::new()),
        }
    }

    fn indexer(&self, repository_id: i64) -> RepositoryIndexer {
        self.indexer_with(repository_id, Config::default())
    }

    fn indexer_with(&self, repository_id: i64, config: Config) -> RepositoryIndexer {
        RepositoryIndexer::new(
            repository_id,
            config,
            self.vectors.clone(),
            self.metadata.clone(),
        )
    }

    async fn documents(&self, repository_id: i64) -> Vec<StoredDocument> {
        let collection = Config::default().storage.collection_name(repository_id);
        self.vectors.list_documents(&collection).await.unwrap()
    }
}

fn write(dir: &TempDir, relative: &str, content: impl AsRef<[u8]>) {
    let path = dir.path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Records every status written, then delegates
struct RecordingMetadataStore {
    inner: InMemoryMetadataStore,
    statuses: Mutex<Vec<RunStatus>>,
}

#[async_trait::async_trait]
impl MetadataStore for RecordingMetadataStore {
    async fn find_file_record(
        &self,
        repository_id: i64,
        relative_path: &str,
    ) -> Result<Option<IndexedFileRecord>> {
        self.inner.find_file_record(repository_id, relative_path).await
    }

    async fn upsert_file_record(&self, record: IndexedFileRecord) -> Result<()> {
        self.inner.upsert_file_record(record).await
    }

    async fn update_repository_summary(&self, summary: RepositorySummary) -> Result<()> {
        self.statuses.lock().unwrap().push(summary.status);
        self.inner.update_repository_summary(summary).await
    }

    async fn repository_summary(&self, repository_id: i64) -> Result<Option<RepositorySummary>> {
        self.inner.repository_summary(repository_id).await
    }

    async fn list_file_records(&self, repository_id: i64) -> Result<Vec<IndexedFileRecord>> {
        self.inner.list_file_records(repository_id).await
    }
}

/// Removes a file once the walk is done, so its read fails
struct VanishingFileStore {
    inner: InMemoryMetadataStore,
    victim: PathBuf,
}

#[async_trait::async_trait]
impl MetadataStore for VanishingFileStore {
    async fn find_file_record(
        &self,
        repository_id: i64,
        relative_path: &str,
    ) -> Result<Option<IndexedFileRecord>> {
        self.inner.find_file_record(repository_id, relative_path).await
    }

    async fn upsert_file_record(&self, record: IndexedFileRecord) -> Result<()> {
        self.inner.upsert_file_record(record).await
    }

    async fn update_repository_summary(&self, summary: RepositorySummary) -> Result<()> {
        if summary.status == RunStatus::Indexing {
            fs::remove_file(&self.victim)?;
        }
        self.inner.update_repository_summary(summary).await
    }

    async fn repository_summary(&self, repository_id: i64) -> Result<Option<RepositorySummary>> {
        self.inner.repository_summary(repository_id).await
    }

    async fn list_file_records(&self, repository_id: i64) -> Result<Vec<IndexedFileRecord>> {
        self.inner.list_file_records(repository_id).await
    }
}

/// Rejects any batch that touches a path containing `broken`
struct FlakyVectorStore {
    inner: InMemoryVectorStore,
}

#[async_trait::async_trait]
impl VectorStore for FlakyVectorStore {
    async fn add_documents(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<crate::types::ChunkMetadata>,
        ids: Vec<String>,
    ) -> Result<usize> {
        if ids.iter().any(|id| id.contains("broken")) {
            anyhow::bail!("connection reset");
        }
        self.inner.add_documents(collection, texts, metadatas, ids).await
    }

    async fn delete_documents(&self, collection: &str, ids: Vec<String>) -> Result<usize> {
        self.inner.delete_documents(collection, ids).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        self.inner.list_documents(collection).await
    }
}

// ===== Run lifecycle =====

#[tokio::test]
async fn test_missing_root_fails_before_any_work() {
    let harness = Harness::new();
    let result = harness
        .indexer(1)
        .index_directory("/nonexistent/repository/path")
        .await;

    assert!(matches!(
        result,
        Err(IndexerError::Path(PathError::NotFound(_)))
    ));
    assert!(harness.metadata.repository_summary(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_root_that_is_a_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "file.py", "x = 1");

    let harness = Harness::new();
    let result = harness
        .indexer(1)
        .index_directory(dir.path().join("file.py"))
        .await;
    assert!(matches!(
        result,
        Err(IndexerError::Path(PathError::NotADirectory(_)))
    ));
}

#[tokio::test]
async fn test_empty_directory_is_ready() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new();

    let stats = harness.indexer(1).index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.final_status(), RunStatus::Ready);

    let summary = harness.metadata.repository_summary(1).await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Ready);
}

#[tokio::test]
async fn test_status_moves_through_indexing() {
    let dir = TempDir::new().unwrap();
    write(&dir, "app.py", PYTHON_SOURCE);

    let metadata = Arc::new(RecordingMetadataStore {
        inner: InMemoryMetadataStore::new(),
        statuses: Mutex::new(Vec::new()),
    });
    let indexer = RepositoryIndexer::new(
        1,
        Config::default(),
        Arc::new(InMemoryVectorStore::new()),
        metadata.clone(),
    );

    indexer.index_directory(dir.path()).await.unwrap();
    assert_eq!(
        *metadata.statuses.lock().unwrap(),
        vec![RunStatus::Indexing, RunStatus::Ready]
    );
}

// ===== Per-file processing =====

#[tokio::test]
async fn test_indexes_python_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "pkg/app.py", PYTHON_SOURCE);

    let harness = Harness::new();
    let stats = harness.indexer(7).index_directory(dir.path()).await.unwrap();

    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.languages.get("python"), Some(&1));

    let record = harness
        .metadata
        .find_file_record(7, "pkg/app.py")
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_indexed);
    assert_eq!(record.file_name, "app.py");
    assert_eq!(record.language, "python");
    assert_eq!(record.class_count, 1);
    assert_eq!(record.function_count, 2);
    assert_eq!(record.line_count, PYTHON_SOURCE.lines().count());

    let docs = harness.documents(7).await;
    assert_eq!(docs.len(), record.chunk_count);
    assert_eq!(stats.total_chunks, record.chunk_count);

    let entity_names: Vec<&str> = docs
        .iter()
        .filter(|d| d.metadata.chunk_type == ChunkKind::Entity)
        .filter_map(|d| d.metadata.entity_name.as_deref())
        .collect();
    assert_eq!(entity_names.len(), 3);
    assert!(entity_names.contains(&"greet"));

    assert!(docs.iter().any(|d| d.id == "7_pkg/app.py_0"));
    assert!(docs.iter().all(|d| d.metadata.repository_id == 7));
}

#[tokio::test]
async fn test_markdown_file_uses_sliding_windows_only() {
    let dir = TempDir::new().unwrap();
    write(&dir, "README.md", "# Title\n\nSome prose.\n\n- item\n");

    let harness = Harness::new();
    let stats = harness.indexer(1).index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.languages.get("markdown"), Some(&1));

    let record = harness
        .metadata
        .find_file_record(1, "README.md")
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_indexed);
    assert_eq!(record.language, "markdown");
    assert_eq!(record.function_count + record.class_count, 0);

    let docs = harness.documents(1).await;
    assert!(!docs.is_empty());
    assert!(
        docs.iter()
            .all(|d| d.metadata.chunk_type == ChunkKind::SlidingWindow)
    );
}

#[tokio::test]
async fn test_unknown_language_is_indexed_but_not_counted() {
    let dir = TempDir::new().unwrap();
    write(&dir, "data.xyz", "alpha\nbeta\n");

    let mut config = Config::default();
    config.walker.allowed_extensions.push("xyz".to_string());

    let harness = Harness::new();
    let stats = harness
        .indexer_with(1, config)
        .index_directory(dir.path())
        .await
        .unwrap();

    assert_eq!(stats.indexed_files, 1);
    assert!(stats.languages.is_empty());

    let record = harness
        .metadata
        .find_file_record(1, "data.xyz")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.language, "unknown");
}

#[tokio::test]
async fn test_empty_file_is_indexed_without_chunks() {
    let dir = TempDir::new().unwrap();
    write(&dir, "empty.py", "");

    let harness = Harness::new();
    let stats = harness.indexer(1).index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.total_chunks, 0);

    let record = harness
        .metadata
        .find_file_record(1, "empty.py")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.line_count, 0);
    assert_eq!(record.chunk_count, 0);
}

#[tokio::test]
async fn test_windows_cover_every_line() {
    let dir = TempDir::new().unwrap();
    let content: String = (0..400)
        .map(|i| format!("value_{} = {}", i, "x".repeat(i % 60)))
        .collect::<Vec<_>>()
        .join("\n");
    write(&dir, "big.py", &content);

    let harness = Harness::new();
    harness.indexer(1).index_directory(dir.path()).await.unwrap();

    let mut spans: Vec<(usize, usize)> = harness
        .documents(1)
        .await
        .iter()
        .filter(|d| d.metadata.chunk_type == ChunkKind::SlidingWindow)
        .map(|d| (d.metadata.start_line, d.metadata.end_line))
        .collect();
    spans.sort();

    assert!(spans.len() > 1);
    assert_eq!(spans[0].0, 1);
    let mut covered = 0;
    for (start, end) in spans {
        assert!(start <= covered + 1, "gap before line {}", start);
        covered = covered.max(end);
    }
    assert_eq!(covered, 400);
}

// ===== Incremental behavior =====

#[tokio::test]
async fn test_second_run_skips_unchanged_files() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.py", PYTHON_SOURCE);
    write(&dir, "b.js", "function b() { return 1; }\n");

    let harness = Harness::new();
    let indexer = harness.indexer(1);

    let first = indexer.index_directory(dir.path()).await.unwrap();
    let docs_first = harness.documents(1).await;
    assert_eq!(first.indexed_files, 2);

    let second = indexer.index_directory(dir.path()).await.unwrap();
    let docs_second = harness.documents(1).await;

    assert_eq!(second.indexed_files, 0);
    assert_eq!(second.skipped_files, 2);
    assert_eq!(second.total_chunks, 0);
    assert_eq!(second.final_status(), RunStatus::Ready);
    assert_eq!(docs_first, docs_second);
}

#[tokio::test]
async fn test_changed_byte_forces_reindex() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.py", "x = 1\n");
    write(&dir, "b.py", "y = 2\n");

    let harness = Harness::new();
    let indexer = harness.indexer(1);
    indexer.index_directory(dir.path()).await.unwrap();
    let original = harness
        .metadata
        .find_file_record(1, "a.py")
        .await
        .unwrap()
        .unwrap();

    write(&dir, "a.py", "x = 2\n");
    let stats = indexer.index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.skipped_files, 1);

    let changed = harness
        .metadata
        .find_file_record(1, "a.py")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(changed.content_hash, original.content_hash);
    assert_eq!(changed.created_at, original.created_at);
    assert!(changed.updated_at >= original.updated_at);

    let docs = harness.documents(1).await;
    let a_doc = docs.iter().find(|d| d.id == "1_a.py_0").unwrap();
    assert_eq!(a_doc.text, "x = 2");

    write(&dir, "a.py", "x = 1\n");
    indexer.index_directory(dir.path()).await.unwrap();
    let reverted = harness
        .metadata
        .find_file_record(1, "a.py")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reverted.content_hash, original.content_hash);
}

#[tokio::test]
async fn test_shrinking_file_drops_stale_chunk_ids() {
    let dir = TempDir::new().unwrap();
    let functions: String = (0..6)
        .map(|i| format!("def f{}():\n    return {}\n", i, i))
        .collect();
    write(&dir, "mod.py", &functions);

    let harness = Harness::new();
    let indexer = harness.indexer(1);
    indexer.index_directory(dir.path()).await.unwrap();
    let before = harness.documents(1).await.len();
    assert_eq!(before, 7);

    write(&dir, "mod.py", "def only():\n    return 0\n");
    indexer.index_directory(dir.path()).await.unwrap();

    let docs = harness.documents(1).await;
    let record = harness
        .metadata
        .find_file_record(1, "mod.py")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(record.chunk_count, 2);
    assert!(docs.iter().all(|d| d.metadata.file_hash == record.content_hash));
}

#[tokio::test]
async fn test_deleted_file_record_is_kept() {
    let dir = TempDir::new().unwrap();
    write(&dir, "gone.py", "x = 1\n");

    let harness = Harness::new();
    let indexer = harness.indexer(1);
    indexer.index_directory(dir.path()).await.unwrap();

    fs::remove_file(dir.path().join("gone.py")).unwrap();
    let stats = indexer.index_directory(dir.path()).await.unwrap();

    assert_eq!(stats.total_files, 0);
    assert_eq!(harness.metadata.list_file_records(1).await.unwrap().len(), 1);
}

// ===== Partial failure =====

#[tokio::test]
async fn test_undecodable_file_fails_alone() {
    let dir = TempDir::new().unwrap();
    write(&dir, "one.py", "a = 1\n");
    write(&dir, "two.js", "const b = () => 2;\n");
    write(&dir, "three.rs", "fn c() {}\n");
    write(&dir, "bad.py", [0x61, 0x20, 0x3d, 0x20, 0xff, 0xfe, 0x0a]);

    let harness = Harness::new();
    let stats = harness.indexer(1).index_directory(dir.path()).await.unwrap();

    assert_eq!(stats.total_files, 4);
    assert_eq!(stats.indexed_files, 3);
    assert_eq!(stats.failed_files, 1);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].contains("bad.py"));
    assert_eq!(stats.final_status(), RunStatus::Error);

    let summary = harness.metadata.repository_summary(1).await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Error);
    assert_eq!(summary.failed_files, 1);

    let docs = harness.documents(1).await;
    for path in ["one.py", "two.js", "three.rs"] {
        assert!(docs.iter().any(|d| d.metadata.file_path == path), "{}", path);
    }
    assert!(!docs.iter().any(|d| d.metadata.file_path == "bad.py"));
    assert!(
        harness
            .metadata
            .find_file_record(1, "bad.py")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_file_removed_after_walk_fails_alone() {
    let dir = TempDir::new().unwrap();
    write(&dir, "kept.py", "a = 1\n");
    write(&dir, "vanishing.py", "b = 2\n");

    let metadata = Arc::new(VanishingFileStore {
        inner: InMemoryMetadataStore::new(),
        victim: dir.path().join("vanishing.py"),
    });
    let vectors = Arc::new(InMemoryVectorStore::new());
    let indexer = RepositoryIndexer::new(1, Config::default(), vectors, metadata.clone());

    let stats = indexer.index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.failed_files, 1);
    assert!(stats.errors[0].contains("vanishing.py"));
    assert!(stats.errors[0].contains("Failed to read file"));

    let summary = metadata.repository_summary(1).await.unwrap().unwrap();
    assert_eq!(summary.status, RunStatus::Error);
    assert!(metadata.find_file_record(1, "kept.py").await.unwrap().is_some());
}

#[tokio::test]
async fn test_read_failure_is_file_level() {
    let dir = TempDir::new().unwrap();
    let indexer = Harness::new().indexer(1);
    let chunker = CodeChunker::from_config(&Config::default().chunking);
    let mut parser = None;

    let result = indexer
        .index_file(
            dir.path(),
            &dir.path().join("missing.py"),
            &indexer.collection_name(),
            &chunker,
            &mut parser,
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, IndexerError::File(FileError::ReadFailed { .. })));
    assert!(err.is_file_level());
}

#[tokio::test]
async fn test_vector_store_failure_is_file_level() {
    let dir = TempDir::new().unwrap();
    write(&dir, "ok.py", "a = 1\n");
    write(&dir, "broken.py", "b = 2\n");

    let metadata = Arc::new(InMemoryMetadataStore::new());
    let indexer = RepositoryIndexer::new(
        1,
        Config::default(),
        Arc::new(FlakyVectorStore {
            inner: InMemoryVectorStore::new(),
        }),
        metadata.clone(),
    );

    let stats = indexer.index_directory(dir.path()).await.unwrap();
    assert_eq!(stats.indexed_files, 1);
    assert_eq!(stats.failed_files, 1);
    assert!(stats.errors[0].contains("connection reset"));

    // No record means the next run retries the file
    assert!(metadata.find_file_record(1, "broken.py").await.unwrap().is_none());
    assert!(metadata.find_file_record(1, "ok.py").await.unwrap().is_some());
}

// ===== Concurrency =====

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repositories_index_concurrently() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    for i in 0..5 {
        write(&first_dir, &format!("f{}.py", i), PYTHON_SOURCE);
        write(&second_dir, &format!("s{}.go", i), "package main\n\nfunc main() {}\n");
    }

    let harness = Harness::new();
    let registry = Arc::new(GrammarRegistry::new());
    let first = harness.indexer(1).with_registry(registry.clone());
    let second = harness.indexer(2).with_registry(registry);

    let (a, b) = tokio::join!(
        first.index_directory(first_dir.path()),
        second.index_directory(second_dir.path())
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.indexed_files, 5);
    assert_eq!(b.indexed_files, 5);
    assert_eq!(a.languages.get("python"), Some(&5));
    assert_eq!(b.languages.get("go"), Some(&5));

    assert!(harness.documents(1).await.iter().all(|d| d.metadata.repository_id == 1));
    assert!(harness.documents(2).await.iter().all(|d| d.metadata.repository_id == 2));
    assert_eq!(harness.metadata.list_file_records(1).await.unwrap().len(), 5);
    assert_eq!(harness.metadata.list_file_records(2).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_index_repository_helper() {
    let dir = TempDir::new().unwrap();
    write(&dir, "main.go", "package main\n\nfunc main() {}\n");

    let stats = index_repository(
        3,
        dir.path(),
        Config::default(),
        Arc::new(InMemoryVectorStore::new()),
        Arc::new(InMemoryMetadataStore::new()),
    )
    .await
    .unwrap();
    assert_eq!(stats.indexed_files, 1);
}
