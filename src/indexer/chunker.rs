use super::CodeChunk;
use super::entity::CodeEntity;
use super::file_info::SourceFile;
use crate::config::ChunkingConfig;
use crate::types::{ChunkKind, ChunkMetadata};

/// Approximate characters per line used to turn the overlap budget into lines
const CHARS_PER_OVERLAP_LINE: usize = 50;

/// Splits a file into entity chunks followed by sliding-window chunks
///
/// Both families are kept; a line inside a function appears in its entity
/// chunk and in at least one window.
#[derive(Debug, Clone, Copy)]
pub struct CodeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CodeChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Number of trailing lines carried into the next window
    ///
    /// This is a line-count heuristic, not an exact character overlap.
    pub fn overlap_lines(&self) -> usize {
        self.chunk_overlap / CHARS_PER_OVERLAP_LINE
    }

    /// Chunk a file; sequence indexes run across both families
    pub fn chunk_file(
        &self,
        file: &SourceFile,
        content: &str,
        repository_id: i64,
        entities: &[CodeEntity],
    ) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();

        for entity in entities {
            let start = entity.start_line.max(1);
            let end = entity.end_line.min(lines.len());
            if start > end {
                continue;
            }

            let mut metadata = base_metadata(file, repository_id, ChunkKind::Entity, start, end);
            metadata.sequence = chunks.len();
            metadata.entity_name = Some(entity.name.clone());
            metadata.entity_type = Some(entity.kind.as_str().to_string());
            metadata.signature = Some(entity.signature.clone());
            metadata.parent = entity.parent.clone();

            chunks.push(CodeChunk {
                content: lines[start - 1..end].join("\n"),
                metadata,
            });
        }

        for (start, end) in self.window_spans(&lines) {
            let mut metadata =
                base_metadata(file, repository_id, ChunkKind::SlidingWindow, start, end);
            metadata.sequence = chunks.len();

            chunks.push(CodeChunk {
                content: lines[start - 1..end].join("\n"),
                metadata,
            });
        }

        chunks
    }

    /// 1-indexed inclusive line spans of the sliding windows
    ///
    /// Lines accumulate until their character count (plus one per newline)
    /// reaches `chunk_size`. Each new window starts with the last
    /// `overlap_lines()` lines of the previous one, capped so every window
    /// advances by at least one line. Whatever is buffered at the end,
    /// including a carried-over seed, is flushed as a final window.
    pub fn window_spans(&self, lines: &[&str]) -> Vec<(usize, usize)> {
        let overlap_lines = self.overlap_lines();
        let mut spans = Vec::new();

        let mut start = 0;
        let mut window_len = 0;
        let mut window_chars = 0;

        for (i, line) in lines.iter().enumerate() {
            window_len += 1;
            window_chars += line.chars().count() + 1;

            if window_chars >= self.chunk_size {
                spans.push((start + 1, i + 1));

                let keep = overlap_lines.min(window_len - 1);
                start = i + 1 - keep;
                window_len = keep;
                window_chars = lines[start..=i]
                    .iter()
                    .map(|l| l.chars().count() + 1)
                    .sum();
            }
        }

        if window_len > 0 {
            spans.push((start + 1, lines.len()));
        }

        spans
    }
}

fn base_metadata(
    file: &SourceFile,
    repository_id: i64,
    chunk_type: ChunkKind,
    start_line: usize,
    end_line: usize,
) -> ChunkMetadata {
    ChunkMetadata {
        repository_id,
        file_path: file.relative_path.clone(),
        language: file.language.as_str().to_string(),
        chunk_type,
        start_line,
        end_line,
        sequence: 0,
        file_hash: file.content_hash.clone(),
        entity_name: None,
        entity_type: None,
        signature: None,
        parent: None,
    }
}
