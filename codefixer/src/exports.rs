use tree_sitter::Node;

use crate::ast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModuleExports {
    pub named: Vec<String>,
    pub has_default: bool,
}

impl ModuleExports {
    /// Finds the named export whose name is most similar to `wanted`,
    /// preferring an exact case-insensitive match, then a prefix/substring
    /// match. Returns `None` when nothing is close enough to suggest.
    pub fn closest_named(&self, wanted: &str) -> Option<&str> {
        if let Some(exact) = self
            .named
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
        {
            return Some(exact.as_str());
        }
        let wanted_lower = wanted.to_ascii_lowercase();
        self.named
            .iter()
            .find(|n| {
                let lower = n.to_ascii_lowercase();
                lower.contains(&wanted_lower) || wanted_lower.contains(&lower)
            })
            .map(|s| s.as_str())
    }
}

/// Parses the exported surface of a TypeScript/TSX source file by walking
/// top-level `export_statement` nodes. Good enough to decide "named vs
/// default" shape mismatches (TS2613/TS2614) and to suggest a replacement
/// for a missing named export (TS2305) without needing a full type checker.
pub(crate) fn parse_exports(source: &str) -> ModuleExports {
    let mut named = Vec::new();
    let mut has_default = false;

    let Some(tree) = ast::parse(source) else {
        return ModuleExports { named, has_default };
    };
    let root = tree.root_node();
    let mut cursor = root.walk();
    for stmt in root.children(&mut cursor) {
        if stmt.kind() != "export_statement" {
            continue;
        }
        let raw = ast::text(stmt, source);
        if raw.trim_start().starts_with("export default") {
            has_default = true;
            continue;
        }

        if let Some(clause) = child_by_kind(stmt, "export_clause") {
            let mut spec_cursor = clause.walk();
            for spec in clause.children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" {
                    continue;
                }
                let Some(name_node) = spec.child_by_field_name("name") else {
                    continue;
                };
                let exported_name = spec
                    .child_by_field_name("alias")
                    .unwrap_or(name_node);
                named.push(ast::text(exported_name, source).to_string());
            }
            continue;
        }

        if let Some(decl) = stmt.child_by_field_name("declaration") {
            named.extend(declared_names(decl, source));
        }
    }

    ModuleExports { named, has_default }
}

fn child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

fn declared_names(decl: Node, source: &str) -> Vec<String> {
    match decl.kind() {
        "function_declaration" | "class_declaration" | "interface_declaration"
        | "type_alias_declaration" | "enum_declaration" => decl
            .child_by_field_name("name")
            .map(|n| vec![ast::text(n, source).to_string()])
            .unwrap_or_default(),
        "lexical_declaration" | "variable_declaration" => {
            let mut names = Vec::new();
            let mut cursor = decl.walk();
            for declarator in decl.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name_node) = declarator.child_by_field_name("name") {
                    names.push(ast::text(name_node, source).to_string());
                }
            }
            names
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_exports() {
        let exports = parse_exports("export function Toaster() {}\nexport const x = 1;\n");
        assert!(exports.named.contains(&"Toaster".to_string()));
        assert!(exports.named.contains(&"x".to_string()));
        assert!(!exports.has_default);
    }

    #[test]
    fn finds_default_export() {
        let exports = parse_exports("export default function App() {}\n");
        assert!(exports.has_default);
    }

    #[test]
    fn closest_named_is_case_insensitive() {
        let exports = ModuleExports { named: vec!["Toaster".to_string()], has_default: false };
        assert_eq!(exports.closest_named("toaster"), Some("Toaster"));
    }
}
