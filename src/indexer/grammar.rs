//! Capability table of grammar backends and their extraction rules

use super::language::Language;
use crate::error::ParseError;
use std::collections::HashMap;

/// How a language attaches documentation to a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStyle {
    /// First string literal in the body (Python docstrings)
    LeadingString,
    /// Contiguous comment block directly above the definition
    PrecedingComments,
}

/// Node kinds the extractor looks for in one grammar
#[derive(Debug)]
pub struct ExtractionRules {
    pub function_kinds: &'static [&'static str],
    pub class_kinds: &'static [&'static str],
    pub import_kinds: &'static [&'static str],
    /// Fields tried in order to resolve a definition's name
    pub name_fields: &'static [&'static str],
    /// Field holding the body of a class-like node
    pub body_field: &'static str,
    pub doc_style: DocStyle,
    /// Names live at the end of a declarator chain (C family)
    pub declarator_names: bool,
    /// Class-like kinds double as type references; only those with a body define something
    pub class_requires_body: bool,
}

impl ExtractionRules {
    pub fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    pub fn is_class(&self, kind: &str) -> bool {
        self.class_kinds.contains(&kind)
    }

    pub fn is_import(&self, kind: &str) -> bool {
        self.import_kinds.contains(&kind)
    }
}

static PYTHON_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    import_kinds: &[
        "import_statement",
        "import_from_statement",
        "future_import_statement",
    ],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::LeadingString,
    declarator_names: false,
    class_requires_body: false,
};

static JAVASCRIPT_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "function_expression",
        "function",
        "generator_function",
        "arrow_function",
        "method_definition",
    ],
    class_kinds: &["class_declaration", "class"],
    import_kinds: &["import_statement"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static TYPESCRIPT_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "function_expression",
        "function",
        "generator_function",
        "arrow_function",
        "method_definition",
        "function_signature",
        "method_signature",
        "abstract_method_signature",
    ],
    class_kinds: &[
        "class_declaration",
        "abstract_class_declaration",
        "class",
        "interface_declaration",
    ],
    import_kinds: &["import_statement"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static RUST_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_item", "function_signature_item"],
    class_kinds: &[
        "struct_item",
        "enum_item",
        "union_item",
        "trait_item",
        "impl_item",
    ],
    import_kinds: &["use_declaration", "extern_crate_declaration"],
    // impl blocks are named after the implemented type
    name_fields: &["name", "type"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static GO_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_declaration", "method_declaration"],
    class_kinds: &["type_spec"],
    import_kinds: &["import_declaration"],
    name_fields: &["name"],
    body_field: "type",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static JAVA_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["method_declaration", "constructor_declaration"],
    class_kinds: &[
        "class_declaration",
        "interface_declaration",
        "enum_declaration",
        "record_declaration",
    ],
    import_kinds: &["import_declaration"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static SWIFT_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &[
        "function_declaration",
        "protocol_function_declaration",
        "init_declaration",
        "deinit_declaration",
    ],
    // structs, enums and extensions are class_declaration too
    class_kinds: &["class_declaration", "protocol_declaration"],
    import_kinds: &["import_declaration"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static C_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_definition"],
    class_kinds: &["struct_specifier", "enum_specifier", "union_specifier"],
    import_kinds: &["preproc_include"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: true,
    class_requires_body: true,
};

static CPP_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_definition"],
    class_kinds: &[
        "class_specifier",
        "struct_specifier",
        "enum_specifier",
        "union_specifier",
    ],
    import_kinds: &["preproc_include", "using_declaration"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: true,
    class_requires_body: true,
};

static CSHARP_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &[
        "method_declaration",
        "constructor_declaration",
        "local_function_statement",
    ],
    class_kinds: &[
        "class_declaration",
        "struct_declaration",
        "interface_declaration",
        "record_declaration",
        "enum_declaration",
    ],
    import_kinds: &["using_directive"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static RUBY_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["method", "singleton_method"],
    class_kinds: &["class", "module"],
    import_kinds: &[],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

static PHP_RULES: ExtractionRules = ExtractionRules {
    function_kinds: &["function_definition", "method_declaration"],
    class_kinds: &[
        "class_declaration",
        "interface_declaration",
        "trait_declaration",
        "enum_declaration",
    ],
    import_kinds: &["namespace_use_declaration"],
    name_fields: &["name"],
    body_field: "body",
    doc_style: DocStyle::PrecedingComments,
    declarator_names: false,
    class_requires_body: false,
};

/// A grammar backend plus the rules used to walk its trees
pub struct Grammar {
    pub language: Language,
    pub ts_language: tree_sitter::Language,
    pub rules: &'static ExtractionRules,
}

/// Which languages have a grammar, decided once at construction
pub struct GrammarRegistry {
    grammars: HashMap<Language, Grammar>,
}

impl GrammarRegistry {
    /// Registry with every bundled grammar
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Language::Python, tree_sitter_python::LANGUAGE.into(), &PYTHON_RULES);
        registry.register(
            Language::JavaScript,
            tree_sitter_javascript::LANGUAGE.into(),
            &JAVASCRIPT_RULES,
        );
        registry.register(
            Language::TypeScript,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            &TYPESCRIPT_RULES,
        );
        registry.register(
            Language::Tsx,
            tree_sitter_typescript::LANGUAGE_TSX.into(),
            &TYPESCRIPT_RULES,
        );
        registry.register(Language::Rust, tree_sitter_rust::LANGUAGE.into(), &RUST_RULES);
        registry.register(Language::Go, tree_sitter_go::LANGUAGE.into(), &GO_RULES);
        registry.register(Language::Java, tree_sitter_java::LANGUAGE.into(), &JAVA_RULES);
        registry.register(Language::Swift, tree_sitter_swift::LANGUAGE.into(), &SWIFT_RULES);
        registry.register(Language::C, tree_sitter_c::LANGUAGE.into(), &C_RULES);
        registry.register(Language::Cpp, tree_sitter_cpp::LANGUAGE.into(), &CPP_RULES);
        registry.register(
            Language::CSharp,
            tree_sitter_c_sharp::LANGUAGE.into(),
            &CSHARP_RULES,
        );
        registry.register(Language::Ruby, tree_sitter_ruby::LANGUAGE.into(), &RUBY_RULES);
        registry.register(Language::Php, tree_sitter_php::LANGUAGE_PHP.into(), &PHP_RULES);
        registry
    }

    /// Registry with no grammars; every file falls back to sliding windows
    pub fn empty() -> Self {
        Self {
            grammars: HashMap::new(),
        }
    }

    fn register(
        &mut self,
        language: Language,
        ts_language: tree_sitter::Language,
        rules: &'static ExtractionRules,
    ) {
        self.grammars.insert(
            language,
            Grammar {
                language,
                ts_language,
                rules,
            },
        );
    }

    pub fn grammar_for(&self, language: Language) -> Result<&Grammar, ParseError> {
        self.grammars
            .get(&language)
            .ok_or_else(|| ParseError::GrammarUnavailable(language.as_str().to_string()))
    }

    pub fn supports(&self, language: Language) -> bool {
        self.grammars.contains_key(&language)
    }

    /// Supported languages, sorted by identifier
    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.grammars.keys().copied().collect();
        languages.sort_by_key(|l| l.as_str());
        languages
    }
}

impl Default for GrammarRegistry {
    fn default() -> Self {
        Self::new()
    }
}
