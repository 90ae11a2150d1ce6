//! Programming language detection from file extensions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language identifier attached to every discovered file
///
/// Only some variants have a grammar backend; see [`GrammarRegistry`](super::GrammarRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    Java,
    Kotlin,
    C,
    Cpp,
    Ruby,
    Php,
    Swift,
    CSharp,
    Scala,
    Shell,
    Sql,
    Markdown,
    Text,
    Json,
    Yaml,
    Toml,
    Html,
    Css,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::CSharp => "csharp",
            Language::Scala => "scala",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Markdown => "markdown",
            Language::Text => "text",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Html => "html",
            Language::Css => "css",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Language::Unknown)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect programming language from file extension
///
/// Unsupported extensions map to [`Language::Unknown`] instead of failing.
pub fn detect_language(extension: &str) -> Language {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "py" | "pyi" => Language::Python,
        "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
        "ts" | "mts" | "cts" => Language::TypeScript,
        "tsx" => Language::Tsx,
        "rs" => Language::Rust,
        "go" => Language::Go,
        "java" => Language::Java,
        "kt" | "kts" => Language::Kotlin,
        "c" | "h" => Language::C,
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
        "rb" => Language::Ruby,
        "php" => Language::Php,
        "swift" => Language::Swift,
        "cs" => Language::CSharp,
        "scala" => Language::Scala,
        "sh" | "bash" => Language::Shell,
        "sql" => Language::Sql,
        "md" | "markdown" => Language::Markdown,
        "txt" => Language::Text,
        "json" => Language::Json,
        "yaml" | "yml" => Language::Yaml,
        "toml" => Language::Toml,
        "html" | "htm" => Language::Html,
        "css" | "scss" | "sass" | "less" => Language::Css,
        _ => Language::Unknown,
    }
}

/// Detect language from a path's extension
pub fn detect_language_for_path(path: &std::path::Path) -> Language {
    path.extension()
        .and_then(|e| e.to_str())
        .map(detect_language)
        .unwrap_or(Language::Unknown)
}
