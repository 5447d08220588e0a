// Regex patterns here are fixed string literals; a failed compile is a
// programmer error caught in tests, not a runtime condition.
#![allow(clippy::expect_used)]

use appforge_protocol::StaticAnalysisIssue;
use regex_lite::Regex;

use crate::ast;
use crate::context::FixCtx;
use crate::fixers::find_import;
use crate::fixers::FixerOutcome;
use crate::resolve;

/// `Cannot find module 'X' or its corresponding type declarations.`
fn module_pattern() -> Regex {
    Regex::new(r"Cannot find module '([^']+)'").expect("static pattern")
}

/// TS2307: the importer references a module that does not resolve. Either
/// the path is slightly wrong (missing extension, wrong alias expansion) and
/// an existing file can be found, or nothing exists and a stub module is
/// synthesized so the importer's own shape (default/named) is satisfied.
pub(crate) fn fix(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(module) = module_pattern()
        .captures(&issue.message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return FixerOutcome::Unfixable("could not parse module specifier from message".into());
    };

    let Some(importer_path) = issue.file_path.as_deref() else {
        return FixerOutcome::Unfixable("no file path on issue".into());
    };
    let Some(importer_source) = ctx.get(importer_path) else {
        return FixerOutcome::Unfixable(format!("importer file {importer_path} not available"));
    };

    if resolve::is_external(&module) {
        return FixerOutcome::Unfixable(format!(
            "'{module}' is an external package, not something the fixer can create"
        ));
    }

    let Some(tree) = ast::parse(&importer_source) else {
        return FixerOutcome::Unfixable(format!("failed to parse {importer_path}"));
    };
    let imports = ast::find_imports(&tree, &importer_source);
    let Some(import) = find_import(&imports, &module) else {
        return FixerOutcome::Unfixable(format!(
            "could not locate an import of '{module}' in {importer_path}"
        ));
    };

    if let Some(existing) = resolve::resolve_existing(ctx, importer_path, &module) {
        let correct_specifier = resolve::specifier_for(importer_path, &module, &existing);
        if correct_specifier == module {
            // The file exists exactly where the import already points; the
            // diagnostic must stem from something this fixer cannot address.
            return FixerOutcome::Unfixable(format!(
                "'{module}' already resolves to {existing}; nothing to rewrite"
            ));
        }
        let quoted = requote(&importer_source, import.module_range, &correct_specifier);
        let rewritten = ast::splice(&importer_source, import.module_range, &quoted);
        ctx.set(importer_path, rewritten);
        return FixerOutcome::Fixed;
    }

    let Some(stub_path) = resolve::stub_path(importer_path, &module) else {
        return FixerOutcome::Unfixable(format!("cannot compute a stub path for '{module}'"));
    };
    if !crate::path_policy::can_modify_file(&stub_path) {
        return FixerOutcome::Unfixable(format!("{stub_path} is outside the writable project"));
    }

    ctx.set(&stub_path, stub_contents(import));
    FixerOutcome::Fixed
}

fn requote(source: &str, range: (usize, usize), specifier: &str) -> String {
    let quote = &source[range.0..range.0 + 1];
    format!("{quote}{specifier}{quote}")
}

fn stub_contents(import: &ast::ImportStatement) -> String {
    let mut out = String::from("// stub module synthesized to satisfy an unresolved import\n");
    if import.default.is_some() {
        out.push_str("export default {} as unknown;\n");
    }
    for named in &import.named {
        out.push_str(&format!(
            "export const {name}: unknown = undefined;\n",
            name = named.imported
        ));
    }
    if import.default.is_none() && import.named.is_empty() {
        out.push_str("export {};\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::context::NoopFetcher;

    #[test]
    fn synthesizes_stub_for_missing_local_module() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/app.ts".to_string(),
            "import { helper } from './lib/helper';\n".to_string(),
        );
        let fetcher = NoopFetcher;
        let ctx = FixCtx::new(files, &fetcher);
        let issue = StaticAnalysisIssue::new(
            "TS2307",
            "Cannot find module './lib/helper' or its corresponding type declarations.",
        )
        .with_file("src/app.ts");

        let outcome = fix(&ctx, &issue);
        assert!(matches!(outcome, FixerOutcome::Fixed));
        let files = ctx.into_files();
        assert!(files.contains_key("src/lib/helper.ts"));
        assert!(files["src/lib/helper.ts"].contains("helper"));
    }

    #[test]
    fn refuses_to_synthesize_external_packages() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/app.ts".to_string(),
            "import React from 'react';\n".to_string(),
        );
        let fetcher = NoopFetcher;
        let ctx = FixCtx::new(files, &fetcher);
        let issue = StaticAnalysisIssue::new(
            "TS2307",
            "Cannot find module 'react' or its corresponding type declarations.",
        )
        .with_file("src/app.ts");

        assert!(matches!(fix(&ctx, &issue), FixerOutcome::Unfixable(_)));
    }
}
