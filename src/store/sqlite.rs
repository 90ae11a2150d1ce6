use super::{MetadataStore, StoredDocument, VectorStore, ensure_parallel};
use crate::types::{ChunkMetadata, IndexedFileRecord, RepositorySummary, RunStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    repository_id INTEGER PRIMARY KEY,
    status TEXT NOT NULL,
    total_files INTEGER NOT NULL,
    indexed_files INTEGER NOT NULL,
    skipped_files INTEGER NOT NULL,
    failed_files INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    languages_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS indexed_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    language TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    line_count INTEGER NOT NULL,
    is_indexed INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    function_count INTEGER NOT NULL,
    class_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (repository_id, relative_path)
);

CREATE TABLE IF NOT EXISTS chunks (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

/// SQLite-backed implementation of both stores
///
/// Each call opens its own connection on a blocking thread, so concurrent
/// runs only contend inside SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }

        let store = Self { path };
        store
            .with_connection(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .context("Failed to initialize database schema")?;

        tracing::debug!("Opened index database at {:?}", store.path);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {:?}", path))?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = ON; \
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(conn)
    }

    /// Run `f` with a fresh connection on the blocking pool
    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::connect(&path)?;
            f(&mut conn)
        })
        .await
        .context("Database task panicked")?
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn get_usize(row: &Row, idx: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(idx)?;
    Ok(usize::try_from(value).unwrap_or_default())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp {:?}", value))?
        .with_timezone(&Utc))
}

const FILE_COLUMNS: &str = "repository_id, file_path, file_name, relative_path, content_hash, \
     language, size_bytes, line_count, is_indexed, chunk_count, function_count, class_count, \
     created_at, updated_at";

/// Raw row; timestamps are parsed outside the rusqlite closure
struct FileRow {
    record: IndexedFileRecord,
    created_at: String,
    updated_at: String,
}

fn read_file_row(row: &Row) -> rusqlite::Result<FileRow> {
    let size_bytes: i64 = row.get(6)?;
    Ok(FileRow {
        record: IndexedFileRecord {
            repository_id: row.get(0)?,
            file_path: row.get(1)?,
            file_name: row.get(2)?,
            relative_path: row.get(3)?,
            content_hash: row.get(4)?,
            language: row.get(5)?,
            size_bytes: u64::try_from(size_bytes).unwrap_or_default(),
            line_count: get_usize(row, 7)?,
            is_indexed: row.get(8)?,
            chunk_count: get_usize(row, 9)?,
            function_count: get_usize(row, 10)?,
            class_count: get_usize(row, 11)?,
            created_at: DateTime::<Utc>::MIN_UTC,
            updated_at: DateTime::<Utc>::MIN_UTC,
        },
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl FileRow {
    fn into_record(self) -> Result<IndexedFileRecord> {
        let mut record = self.record;
        record.created_at = parse_time(&self.created_at)?;
        record.updated_at = parse_time(&self.updated_at)?;
        Ok(record)
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteStore {
    async fn add_documents(
        &self,
        collection: &str,
        texts: Vec<String>,
        metadatas: Vec<ChunkMetadata>,
        ids: Vec<String>,
    ) -> Result<usize> {
        ensure_parallel(texts.len(), metadatas.len(), ids.len())?;
        let collection = collection.to_string();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO chunks (collection, id, content, metadata_json)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(collection, id) DO UPDATE SET
                        content = excluded.content,
                        metadata_json = excluded.metadata_json",
                )?;
                for ((id, text), metadata) in ids.iter().zip(&texts).zip(&metadatas) {
                    let metadata_json = serde_json::to_string(metadata)?;
                    stmt.execute(params![collection, id, text, metadata_json])?;
                }
            }
            tx.commit()?;
            Ok(ids.len())
        })
        .await
    }

    async fn delete_documents(&self, collection: &str, ids: Vec<String>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let collection = collection.to_string();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM chunks WHERE collection = ?1 AND id = ?2")?;
                for id in &ids {
                    removed += stmt.execute(params![collection, id])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collection = collection.to_string();
        self.with_connection(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let collection = collection.to_string();
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, metadata_json FROM chunks WHERE collection = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut documents = Vec::new();
            for row in rows {
                let (id, text, metadata_json) = row?;
                let metadata = serde_json::from_str(&metadata_json)
                    .with_context(|| format!("Corrupt metadata for chunk {}", id))?;
                documents.push(StoredDocument { id, text, metadata });
            }
            Ok(documents)
        })
        .await
    }
}

#[async_trait::async_trait]
impl MetadataStore for SqliteStore {
    async fn find_file_record(
        &self,
        repository_id: i64,
        relative_path: &str,
    ) -> Result<Option<IndexedFileRecord>> {
        let relative_path = relative_path.to_string();
        let row = self
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT {} FROM indexed_files WHERE repository_id = ?1 AND relative_path = ?2",
                    FILE_COLUMNS
                );
                Ok(conn
                    .query_row(&sql, params![repository_id, relative_path], read_file_row)
                    .optional()?)
            })
            .await?;
        row.map(FileRow::into_record).transpose()
    }

    async fn upsert_file_record(&self, record: IndexedFileRecord) -> Result<()> {
        self.with_connection(move |conn| {
            let sql = format!(
                "INSERT INTO indexed_files ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(repository_id, relative_path) DO UPDATE SET
                    file_path = excluded.file_path,
                    file_name = excluded.file_name,
                    content_hash = excluded.content_hash,
                    language = excluded.language,
                    size_bytes = excluded.size_bytes,
                    line_count = excluded.line_count,
                    is_indexed = excluded.is_indexed,
                    chunk_count = excluded.chunk_count,
                    function_count = excluded.function_count,
                    class_count = excluded.class_count,
                    updated_at = excluded.updated_at",
                FILE_COLUMNS
            );
            conn.execute(
                &sql,
                params![
                    record.repository_id,
                    record.file_path,
                    record.file_name,
                    record.relative_path,
                    record.content_hash,
                    record.language,
                    i64::try_from(record.size_bytes).unwrap_or(i64::MAX),
                    to_i64(record.line_count),
                    record.is_indexed,
                    to_i64(record.chunk_count),
                    to_i64(record.function_count),
                    to_i64(record.class_count),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_repository_summary(&self, summary: RepositorySummary) -> Result<()> {
        self.with_connection(move |conn| {
            let languages_json = serde_json::to_string(&summary.languages)?;
            conn.execute(
                "INSERT INTO repositories (
                    repository_id, status, total_files, indexed_files, skipped_files,
                    failed_files, total_chunks, languages_json, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(repository_id) DO UPDATE SET
                    status = excluded.status,
                    total_files = excluded.total_files,
                    indexed_files = excluded.indexed_files,
                    skipped_files = excluded.skipped_files,
                    failed_files = excluded.failed_files,
                    total_chunks = excluded.total_chunks,
                    languages_json = excluded.languages_json,
                    updated_at = excluded.updated_at",
                params![
                    summary.repository_id,
                    summary.status.as_str(),
                    to_i64(summary.total_files),
                    to_i64(summary.indexed_files),
                    to_i64(summary.skipped_files),
                    to_i64(summary.failed_files),
                    to_i64(summary.total_chunks),
                    languages_json,
                    summary.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn repository_summary(&self, repository_id: i64) -> Result<Option<RepositorySummary>> {
        let row = self
            .with_connection(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT status, total_files, indexed_files, skipped_files, failed_files,
                                total_chunks, languages_json, updated_at
                         FROM repositories WHERE repository_id = ?1",
                        params![repository_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                [
                                    get_usize(row, 1)?,
                                    get_usize(row, 2)?,
                                    get_usize(row, 3)?,
                                    get_usize(row, 4)?,
                                    get_usize(row, 5)?,
                                ],
                                row.get::<_, String>(6)?,
                                row.get::<_, String>(7)?,
                            ))
                        },
                    )
                    .optional()?)
            })
            .await?;

        let Some((status, counts, languages_json, updated_at)) = row else {
            return Ok(None);
        };
        let [total_files, indexed_files, skipped_files, failed_files, total_chunks] = counts;

        Ok(Some(RepositorySummary {
            repository_id,
            status: RunStatus::parse(&status)
                .with_context(|| format!("Unknown run status {:?}", status))?,
            total_files,
            indexed_files,
            skipped_files,
            failed_files,
            total_chunks,
            languages: serde_json::from_str(&languages_json)
                .context("Corrupt language histogram")?,
            updated_at: parse_time(&updated_at)?,
        }))
    }

    async fn list_file_records(&self, repository_id: i64) -> Result<Vec<IndexedFileRecord>> {
        let rows = self
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT {} FROM indexed_files WHERE repository_id = ?1 ORDER BY relative_path",
                    FILE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![repository_id], read_file_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(FileRow::into_record).collect()
    }
}
