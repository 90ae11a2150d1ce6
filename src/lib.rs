//! # Codebase Indexer - incremental source-tree indexing for retrieval
//!
//! Walks a repository, extracts functions, methods and classes with
//! tree-sitter, fingerprints every file with SHA-256 and splits it into
//! retrieval-sized chunks. Chunks go to a vector store and per-file
//! bookkeeping goes to a metadata store; both are injected per run.
//!
//! ## Pipeline
//!
//! ```text
//! FileWalker ──► SourceFile (hash, language) ──► unchanged? ──► skip
//!                                                   │
//!                                                   ▼
//!                       AstParser ──► CodeChunker ──► VectorStore + MetadataStore
//! ```
//!
//! A run moves its repository from `indexing` to `ready`, or to `error` when
//! any file failed. File-level failures never abort the run.
//!
//! ## Modules
//!
//! - [`indexer`]: walking, language detection, fingerprinting, AST extraction, chunking
//! - [`indexing`]: the per-repository run orchestrator
//! - [`store`]: vector and metadata store traits with in-memory and SQLite backends
//! - [`config`]: configuration with TOML files and environment overrides
//! - [`types`]: records returned to callers and persisted by stores
//! - [`error`]: error types
//! - [`paths`]: platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use codebase_indexer::config::Config;
//! use codebase_indexer::indexing::RepositoryIndexer;
//! use codebase_indexer::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new()?;
//!     let store = Arc::new(SqliteStore::open(&config.storage.database_path).await?);
//!
//!     let indexer = RepositoryIndexer::new(1, config, store.clone(), store);
//!     let stats = indexer.index_directory("./my-project").await?;
//!     println!("indexed {} files", stats.indexed_files);
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// File walking, AST extraction and chunking
pub mod indexer;

/// Indexing run orchestration
pub mod indexing;

/// Platform-specific default locations
pub mod paths;

/// Persistence collaborators
pub mod store;

/// Stats, records and chunk metadata
pub mod types;
