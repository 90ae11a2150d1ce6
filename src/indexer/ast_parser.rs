use super::entity::{CodeEntity, EntityKind, ParsedSource};
use super::grammar::{DocStyle, ExtractionRules, GrammarRegistry};
use super::language::Language;
use crate::error::ParseError;
use std::collections::HashMap;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Kinds whose name lives on an enclosing declaration rather than the node itself
const ANONYMOUS_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
    "class",
];

/// AST parser extracting entities and imports from source bytes
///
/// Owns one tree-sitter parser per language, created on first use.
pub struct AstParser {
    registry: Arc<GrammarRegistry>,
    parsers: HashMap<Language, Parser>,
}

impl AstParser {
    pub fn new(registry: Arc<GrammarRegistry>) -> Self {
        Self {
            registry,
            parsers: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &GrammarRegistry {
        &self.registry
    }

    /// Parse `source` and extract entities and import statements
    ///
    /// Returns [`ParseError::GrammarUnavailable`] for languages without a grammar.
    pub fn parse(&mut self, language: Language, source: &[u8]) -> Result<ParsedSource, ParseError> {
        let grammar = self.registry.grammar_for(language)?;
        let rules = grammar.rules;

        let parser = match self.parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser
                    .set_language(&grammar.ts_language)
                    .map_err(|e| ParseError::LanguageSetup {
                        language: language.as_str().to_string(),
                        reason: e.to_string(),
                    })?;
                entry.insert(parser)
            }
        };

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParseError::ParseFailed(format!("{} parser returned no tree", language)))?;

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("Syntax errors in {} source, extracting what parsed", language);
        }

        let mut extraction = Extraction {
            source,
            rules,
            entities: Vec::new(),
        };
        let mut scope = Vec::new();
        extraction.visit(root, None, &mut scope);

        let mut imports = Vec::new();
        collect_imports(root, source, rules, &mut imports);

        Ok(ParsedSource {
            entities: extraction.entities,
            imports,
        })
    }
}

struct Extraction<'a> {
    source: &'a [u8],
    rules: &'static ExtractionRules,
    entities: Vec<CodeEntity>,
}

impl Extraction<'_> {
    /// Depth-first walk; `parent` is the innermost enclosing class, `scope` the whole chain
    fn visit(&mut self, node: Node, parent: Option<&str>, scope: &mut Vec<String>) {
        let kind = node.kind();

        if self.rules.is_function(kind) {
            if let Some(name) = self.resolve_name(node) {
                let entity_kind = if parent.is_some() {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                };
                let entity = self.entity(node, name, entity_kind, parent, scope);
                self.entities.push(entity);
            }
        } else if self.rules.is_class(kind)
            && let Some(name) = self.resolve_name(node)
        {
            let body = node.child_by_field_name(self.rules.body_field);
            if body.is_some() || !self.rules.class_requires_body {
                let entity = self.entity(node, name.clone(), EntityKind::Class, parent, scope);
                self.entities.push(entity);

                // Members are visited once, with this class as parent
                let members = body.unwrap_or(node);
                scope.push(name.clone());
                let mut cursor = members.walk();
                for child in members.children(&mut cursor) {
                    self.visit(child, Some(&name), scope);
                }
                scope.pop();
                return;
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, parent, scope);
        }
    }

    fn entity(
        &self,
        node: Node,
        name: String,
        kind: EntityKind,
        parent: Option<&str>,
        scope: &[String],
    ) -> CodeEntity {
        let (start_line, end_line) = line_span(node);
        let qualified_name = if scope.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", scope.join("."), name)
        };

        CodeEntity {
            signature: self.signature(node, &name),
            docstring: self.docstring(node),
            parent: parent.map(str::to_string),
            qualified_name,
            name,
            kind,
            start_line,
            end_line,
        }
    }

    /// Name from the node's own fields, or from the declaration holding an anonymous value
    fn resolve_name(&self, node: Node) -> Option<String> {
        if self.rules.declarator_names
            && let Some(declarator) = node.child_by_field_name("declarator")
        {
            return innermost_identifier(declarator).map(|n| node_text(n, self.source));
        }

        for field in self.rules.name_fields {
            if let Some(name_node) = node.child_by_field_name(field) {
                let name = node_text(name_node, self.source);
                if !name.trim().is_empty() {
                    return Some(name);
                }
            }
        }

        if !ANONYMOUS_KINDS.contains(&node.kind()) {
            return None;
        }

        let holder = node.parent()?;
        let name_node = match holder.kind() {
            "variable_declarator" => holder.child_by_field_name("name"),
            "field_definition" | "public_field_definition" => holder
                .child_by_field_name("property")
                .or_else(|| holder.child_by_field_name("name")),
            "pair" => holder.child_by_field_name("key"),
            _ => None,
        }?;

        // Destructuring patterns have no single name
        if !matches!(
            name_node.kind(),
            "identifier" | "property_identifier" | "private_property_identifier" | "string"
        ) {
            return None;
        }

        let name = node_text(name_node, self.source);
        let name = name.trim_matches(|c| c == '"' || c == '\'').to_string();
        (!name.is_empty()).then_some(name)
    }

    /// Declaration header up to the body, whitespace collapsed
    fn signature(&self, node: Node, name: &str) -> String {
        let header = match node.child_by_field_name(self.rules.body_field) {
            Some(body) if body.start_byte() > node.start_byte() => {
                String::from_utf8_lossy(&self.source[node.start_byte()..body.start_byte()])
                    .to_string()
            }
            _ => node_text(node, self.source)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let collapsed = header.split_whitespace().collect::<Vec<_>>().join(" ");
        let signature = collapsed
            .trim_end_matches(|c: char| c == ':' || c == '{' || c == ';' || c.is_whitespace())
            .to_string();

        if signature.is_empty() {
            name.to_string()
        } else if !signature.contains(name) {
            format!("{} = {}", name, signature)
        } else {
            signature
        }
    }

    fn docstring(&self, node: Node) -> Option<String> {
        match self.rules.doc_style {
            DocStyle::LeadingString => self.leading_string(node),
            DocStyle::PrecedingComments => self.preceding_comments(node).or_else(|| {
                // `export function f` keeps its comment above the export statement
                node.parent()
                    .filter(|p| p.kind() == "export_statement")
                    .and_then(|p| self.preceding_comments(p))
            }),
        }
    }

    fn leading_string(&self, node: Node) -> Option<String> {
        let body = node.child_by_field_name(self.rules.body_field)?;
        let mut cursor = body.walk();
        let first = body.named_children(&mut cursor).next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let mut inner_cursor = first.walk();
        let literal = first.named_children(&mut inner_cursor).next()?;
        if literal.kind() != "string" {
            return None;
        }
        let cleaned = clean_string_literal(&node_text(literal, self.source));
        (!cleaned.is_empty()).then_some(cleaned)
    }

    fn preceding_comments(&self, node: Node) -> Option<String> {
        let mut blocks = Vec::new();
        let mut next_row = node.start_position().row;
        let mut prev = node.prev_named_sibling();

        while let Some(sibling) = prev {
            let kind = sibling.kind();
            if kind == "attribute_item" || kind == "decorator" {
                next_row = sibling.start_position().row;
                prev = sibling.prev_named_sibling();
                continue;
            }
            if !kind.contains("comment") || sibling.end_position().row + 1 < next_row {
                break;
            }
            blocks.push(node_text(sibling, self.source));
            next_row = sibling.start_position().row;
            prev = sibling.prev_named_sibling();
        }

        if blocks.is_empty() {
            return None;
        }
        blocks.reverse();
        let cleaned = clean_comment(&blocks.join("\n"));
        (!cleaned.is_empty()).then_some(cleaned)
    }
}

/// Second, independent pass collecting import statements in source order
fn collect_imports(node: Node, source: &[u8], rules: &ExtractionRules, imports: &mut Vec<String>) {
    if rules.is_import(node.kind()) {
        imports.push(node_text(node, source).trim().to_string());
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_imports(child, source, rules, imports);
    }
}

/// Walk a C-style declarator chain (`*f`, `f(int)`, `ns::f`) down to its identifier
///
/// Destructor and operator names are taken whole (`~Foo`, `operator==`).
fn innermost_identifier(node: Node) -> Option<Node> {
    if matches!(
        node.kind(),
        "identifier" | "field_identifier" | "destructor_name" | "operator_name"
    ) {
        return Some(node);
    }
    if let Some(inner) = node.child_by_field_name("declarator") {
        return innermost_identifier(inner);
    }
    // Qualified names end with the identifier
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    children.into_iter().rev().find_map(innermost_identifier)
}

fn node_text(node: Node, source: &[u8]) -> String {
    let end = node.end_byte().min(source.len());
    let start = node.start_byte().min(end);
    String::from_utf8_lossy(&source[start..end]).to_string()
}

/// 1-indexed inclusive line span; a node ending at column 0 ends on the previous line
fn line_span(node: Node) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let start_line = start.row + 1;
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    (start_line, end_line.max(start_line))
}

/// Strip comment markers from each line of a comment block
fn clean_comment(comment: &str) -> String {
    comment
        .lines()
        .map(|line| {
            let mut s = line.trim();
            for prefix in ["///", "//!", "//", "/**", "/*", "#"] {
                if let Some(rest) = s.strip_prefix(prefix) {
                    s = rest;
                    break;
                }
            }
            s = s.trim_end_matches("*/").trim();
            s.strip_prefix('*').unwrap_or(s).trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove string prefixes and quotes from a docstring literal
fn clean_string_literal(literal: &str) -> String {
    let unprefixed = literal.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|quote| {
            unprefixed
                .strip_prefix(quote)
                .and_then(|s| s.strip_suffix(quote))
        })
        .unwrap_or(unprefixed);

    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
