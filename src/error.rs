/// Centralized error types for codebase-indexer using thiserror
///
/// Run-level errors (a bad root path, a dead worker task) abort an indexing
/// run; file-level errors are recorded against a single file and the run
/// moves on.
use thiserror::Error;

/// Main error type for the indexer
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors about the repository root handed to a run
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Directory not found: {0}")]
    NotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),
}

/// Errors reading a single source file
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to read file '{file}': {reason}")]
    ReadFailed { file: String, reason: String },

    #[error("File is not valid UTF-8: {0}")]
    Decode(String),
}

/// Errors from the grammar backend
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("No grammar available for language: {0}")]
    GrammarUnavailable(String),

    #[error("Failed to configure parser for {language}: {reason}")]
    LanguageSetup { language: String, reason: String },

    #[error("Failed to parse source: {0}")]
    ParseFailed(String),
}

/// Errors raised by the vector store or metadata store collaborators
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Vector store failure: {0}")]
    VectorStore(String),

    #[error("Metadata store failure: {0}")]
    MetadataStore(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<anyhow::Error> for IndexerError {
    fn from(err: anyhow::Error) -> Self {
        IndexerError::Other(format!("{:#}", err))
    }
}

impl IndexerError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        IndexerError::Other(msg.into())
    }

    /// Whether this error only concerns one file, so the run can continue
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            IndexerError::File(_)
                | IndexerError::Parse(_)
                | IndexerError::Persistence(_)
                | IndexerError::Io(_)
        )
    }
}
