//! File discovery, language detection, AST extraction and chunking
//!
//! Everything here works on one file at a time; the run-level orchestration
//! lives in [`crate::indexing`].

mod ast_parser;
mod chunker;
mod entity;
mod file_info;
mod file_walker;
mod fingerprint;
mod grammar;
mod language;

pub use ast_parser::AstParser;
pub use chunker::CodeChunker;
pub use entity::{CodeEntity, EntityKind, ParsedSource};
pub use file_info::{SourceFile, relative_path};
pub use file_walker::FileWalker;
pub use fingerprint::content_hash;
pub use grammar::{DocStyle, ExtractionRules, Grammar, GrammarRegistry};
pub use language::{Language, detect_language, detect_language_for_path};

use crate::types::ChunkMetadata;

/// A slice of file text ready to hand to the vector store
#[derive(Debug, Clone)]
pub struct CodeChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Stable chunk identifier: `{repository_id}_{relative_path}_{sequence}`
pub fn chunk_id(repository_id: i64, relative_path: &str, sequence: usize) -> String {
    format!("{}_{}_{}", repository_id, relative_path, sequence)
}
