//! Structural entities extracted from a parsed file

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Method,
    Class,
    Variable,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Class => "class",
            EntityKind::Variable => "variable",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, EntityKind::Function | EntityKind::Method)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named function, method or class found in one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub name: String,
    pub kind: EntityKind,
    /// 1-indexed
    pub start_line: usize,
    /// 1-indexed, never before `start_line`
    pub end_line: usize,
    pub signature: String,
    pub docstring: Option<String>,
    /// Innermost enclosing class only
    pub parent: Option<String>,
    /// Dot-joined chain of enclosing classes plus the name, e.g. `Outer.Inner.run`
    pub qualified_name: String,
}

/// Everything the grammar backend extracted from one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSource {
    pub entities: Vec<CodeEntity>,
    /// Raw import statements in source order, duplicates kept
    pub imports: Vec<String>,
}

impl ParsedSource {
    /// Functions plus methods
    pub fn function_count(&self) -> usize {
        self.entities.iter().filter(|e| e.kind.is_callable()).count()
    }

    pub fn class_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|e| e.kind == EntityKind::Class)
            .count()
    }
}
