//! Thin wrapper around `tree-sitter` + `tree-sitter-typescript`, giving the
//! fixers a real AST to rewrite import/export syntax against instead of
//! regexes.

use tree_sitter::Language;
use tree_sitter::Node;
use tree_sitter::Parser;
use tree_sitter::Tree;

fn ts_language() -> Language {
    tree_sitter_typescript::LANGUAGE_TSX.into()
}

pub(crate) fn parse(source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&ts_language()).ok()?;
    parser.parse(source, None)
}

pub(crate) fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}

/// Strips the surrounding quotes from a parsed `string` node's text.
pub(crate) fn unquote(raw: &str) -> &str {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

#[derive(Debug, Clone)]
pub(crate) struct NamedImport {
    /// The name as exported by the module (before any `as` alias).
    pub imported: String,
    /// The name used locally (equal to `imported` unless aliased).
    pub local: String,
    /// Byte range of just the `imported` identifier, for splicing renames.
    pub name_range: (usize, usize),
}

#[derive(Debug, Clone)]
pub(crate) struct ImportStatement {
    /// Byte range of the whole `import ... ;` statement.
    pub stmt_range: (usize, usize),
    /// Byte range of the module specifier's string literal, quotes included.
    pub module_range: (usize, usize),
    pub module: String,
    /// Default import local name and the byte range of that identifier.
    pub default: Option<(String, (usize, usize))>,
    pub named: Vec<NamedImport>,
    /// Byte range covering `{ ... }` for named imports, if present.
    pub named_block_range: Option<(usize, usize)>,
}

/// Walks the top-level statements of `tree` and collects every
/// `import_statement` with enough structure to rewrite it.
pub(crate) fn find_imports(tree: &Tree, source: &str) -> Vec<ImportStatement> {
    let mut out = Vec::new();
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "import_statement" {
            continue;
        }
        let Some(source_node) = child.child_by_field_name("source") else {
            continue;
        };
        let module = unquote(text(source_node, source)).to_string();

        let mut default = None;
        let mut named = Vec::new();
        let mut named_block_range = None;

        if let Some(clause) = find_child_by_kind(child, "import_clause") {
            let mut clause_cursor = clause.walk();
            for part in clause.children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => {
                        let name = text(part, source).to_string();
                        default = Some((name, (part.start_byte(), part.end_byte())));
                    }
                    "named_imports" => {
                        named_block_range = Some((part.start_byte(), part.end_byte()));
                        let mut spec_cursor = part.walk();
                        for spec in part.children(&mut spec_cursor) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name_node) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let imported = text(name_node, source).to_string();
                            let local = spec
                                .child_by_field_name("alias")
                                .map(|a| text(a, source).to_string())
                                .unwrap_or_else(|| imported.clone());
                            named.push(NamedImport {
                                imported,
                                local,
                                name_range: (name_node.start_byte(), name_node.end_byte()),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        out.push(ImportStatement {
            stmt_range: (child.start_byte(), child.end_byte()),
            module_range: (source_node.start_byte(), source_node.end_byte()),
            module,
            default,
            named,
            named_block_range,
        });
    }
    out
}

fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// Splices `replacement` into `source` at the given byte range.
pub(crate) fn splice(source: &str, range: (usize, usize), replacement: &str) -> String {
    let (start, end) = range;
    let mut out = String::with_capacity(source.len() - (end - start) + replacement.len());
    out.push_str(&source[..start]);
    out.push_str(replacement);
    out.push_str(&source[end..]);
    out
}

/// Returns the byte offset immediately after the last top-level import
/// statement, or 0 if there are none — used to inject placeholder
/// declarations immediately after the last import.
pub(crate) fn end_of_imports(tree: &Tree) -> usize {
    let root = tree.root_node();
    let mut cursor = root.walk();
    root.children(&mut cursor)
        .filter(|c| c.kind() == "import_statement")
        .map(|c| c.end_byte())
        .max()
        .unwrap_or(0)
}
