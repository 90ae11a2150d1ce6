/// Configuration system for codebase-indexer
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, IndexerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// File discovery policy
    #[serde(default)]
    pub walker: WalkerConfig,

    /// Chunk sizing
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Storage locations and namespaces
    #[serde(default)]
    pub storage: StorageConfig,
}

/// File discovery policy handed to the walker on every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Extensions (without the leading dot, compared case-insensitively) to index
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Directory names that exclude every path passing through them
    #[serde(default = "default_denied_directories")]
    pub denied_directories: Vec<String>,

    /// Maximum file size to index (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Additionally honor .gitignore / .ignore files
    #[serde(default)]
    pub respect_gitignore: bool,
}

/// Sliding-window chunk sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Character threshold at which a sliding-window chunk is emitted
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap budget in characters, converted to lines at 50 chars per line
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database for file records, repository summaries and chunks
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Prefix of the per-repository chunk collection name
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "py", "js", "jsx", "ts", "tsx", "mjs", "cjs", "java", "kt", "go", "rs", "c", "cpp", "h",
        "hpp", "rb", "php", "swift", "cs", "scala", "sh", "bash", "sql", "md", "txt", "json",
        "yaml", "yml", "toml", "html", "css", "scss", "sass", "less",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_denied_directories() -> Vec<String> {
    [
        "node_modules",
        "__pycache__",
        ".git",
        ".svn",
        ".hg",
        "venv",
        ".venv",
        "env",
        ".env",
        "dist",
        "build",
        ".next",
        ".nuxt",
        ".cache",
        "coverage",
        ".pytest_cache",
        "target",
        ".idea",
        ".vscode",
        "__MACOSX",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024 // 5 MB
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_database_path() -> PathBuf {
    crate::paths::PlatformPaths::default_database_path()
}

fn default_collection_prefix() -> String {
    "codebase".to_string()
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            denied_directories: default_denied_directories(),
            max_file_size: default_max_file_size(),
            respect_gitignore: false,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

impl StorageConfig {
    /// Chunk collection namespace for one repository
    pub fn collection_name(&self, repository_id: i64) -> String {
        format!("{}_repo_{}", self.collection_prefix, repository_id)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, IndexerError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, IndexerError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), IndexerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunking.chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunking.chunk_overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({}), got {}",
                    self.chunking.chunk_size, self.chunking.chunk_overlap
                ),
            }
            .into());
        }

        if self.walker.max_file_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "walker.max_file_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.walker.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "walker.allowed_extensions".to_string(),
                reason: "must list at least one extension".to_string(),
            }
            .into());
        }

        if self.storage.collection_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.collection_prefix".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CODEBASE_INDEXER_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        if let Ok(size) = std::env::var("CODEBASE_INDEXER_MAX_FILE_SIZE")
            && let Ok(size) = size.parse()
        {
            self.walker.max_file_size = size;
        }

        if let Ok(size) = std::env::var("CODEBASE_INDEXER_CHUNK_SIZE")
            && let Ok(size) = size.parse()
        {
            self.chunking.chunk_size = size;
        }

        if let Ok(overlap) = std::env::var("CODEBASE_INDEXER_CHUNK_OVERLAP")
            && let Ok(overlap) = overlap.parse()
        {
            self.chunking.chunk_overlap = overlap;
        }

        if let Ok(flag) = std::env::var("CODEBASE_INDEXER_RESPECT_GITIGNORE")
            && let Ok(flag) = flag.parse()
        {
            self.walker.respect_gitignore = flag;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, IndexerError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
