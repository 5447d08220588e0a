// Regex patterns here are fixed string literals; a failed compile is a
// programmer error caught in tests, not a runtime condition.
#![allow(clippy::expect_used)]

use appforge_protocol::StaticAnalysisIssue;
use regex_lite::Regex;

use crate::ast;
use crate::context::FixCtx;
use crate::fixers::find_import;
use crate::fixers::FixerOutcome;

/// `'"X"' has no exported member named 'Y'. Did you mean 'Z'?`
fn pattern() -> Regex {
    Regex::new(r#"'"([^"]+)"' has no exported member named '([^']+)'\. Did you mean '([^']+)'\?"#)
        .expect("static pattern")
}

/// TS2724: the compiler already names the exact replacement. Rewrites the
/// import specifier and every bare reference to the old local name in the
/// same file to the suggested name.
pub(crate) fn fix(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(captures) = pattern().captures(&issue.message) else {
        return FixerOutcome::Unfixable("could not parse message".into());
    };
    let module = captures.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
    let old_name = captures.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
    let new_name = captures.get(3).map(|m| m.as_str()).unwrap_or_default().to_string();

    let Some(importer_path) = issue.file_path.as_deref() else {
        return FixerOutcome::Unfixable("no file path on issue".into());
    };
    let Some(importer_source) = ctx.get(importer_path) else {
        return FixerOutcome::Unfixable(format!("importer file {importer_path} not available"));
    };

    let Some(tree) = ast::parse(&importer_source) else {
        return FixerOutcome::Unfixable(format!("failed to parse {importer_path}"));
    };
    let imports = ast::find_imports(&tree, &importer_source);
    let Some(import) = find_import(&imports, &module) else {
        return FixerOutcome::Unfixable(format!("could not locate import of '{module}'"));
    };
    let Some(named) = import.named.iter().find(|n| n.imported == old_name) else {
        return FixerOutcome::Unfixable(format!(
            "'{old_name}' is not a named specifier of this import"
        ));
    };
    let had_alias = named.local != named.imported;

    let rewritten = ast::splice(&importer_source, named.name_range, &new_name);
    let rewritten = if had_alias {
        rewritten
    } else {
        rename_bare_references(&rewritten, &old_name, &new_name)
    };
    ctx.set(importer_path, rewritten);
    FixerOutcome::Fixed
}

fn rename_bare_references(source: &str, old: &str, new: &str) -> String {
    let word = Regex::new(&format!(r"\b{}\b", regex_lite::escape(old))).expect("dynamic word pattern");
    word.replace_all(source, new).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::context::NoopFetcher;

    #[test]
    fn rewrites_toast_to_toaster_exact_scenario() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/App.tsx".to_string(),
            "import { toast } from \"@/components/ui/sonner\";\n\nfunction App() {\n  toast(\"hi\");\n}\n".to_string(),
        );
        let fetcher = NoopFetcher;
        let ctx = FixCtx::new(files, &fetcher);
        let issue = StaticAnalysisIssue::new(
            "TS2724",
            "'\"@/components/ui/sonner\"' has no exported member named 'toast'. Did you mean 'Toaster'?",
        )
        .with_file("src/App.tsx");

        assert!(matches!(fix(&ctx, &issue), FixerOutcome::Fixed));
        let files = ctx.into_files();
        let rewritten = &files["src/App.tsx"];
        assert!(rewritten.contains("import { Toaster } from \"@/components/ui/sonner\";"));
        assert!(rewritten.contains("Toaster(\"hi\");"));
        assert!(!rewritten.contains("toast"));
    }

    #[test]
    fn leaves_aliased_imports_alone() {
        let mut files = BTreeMap::new();
        files.insert(
            "src/App.tsx".to_string(),
            "import { toast as notify } from \"@/components/ui/sonner\";\n".to_string(),
        );
        let fetcher = NoopFetcher;
        let ctx = FixCtx::new(files, &fetcher);
        let issue = StaticAnalysisIssue::new(
            "TS2724",
            "'\"@/components/ui/sonner\"' has no exported member named 'toast'. Did you mean 'Toaster'?",
        )
        .with_file("src/App.tsx");

        assert!(matches!(fix(&ctx, &issue), FixerOutcome::Fixed));
        let files = ctx.into_files();
        assert_eq!(
            files["src/App.tsx"],
            "import { Toaster as notify } from \"@/components/ui/sonner\";\n"
        );
    }
}
