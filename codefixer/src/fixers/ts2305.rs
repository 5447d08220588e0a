// Regex patterns here are fixed string literals; a failed compile is a
// programmer error caught in tests, not a runtime condition.
#![allow(clippy::expect_used)]

use appforge_protocol::StaticAnalysisIssue;
use regex_lite::Regex;

use crate::ast;
use crate::context::FixCtx;
use crate::exports;
use crate::fixers::find_import;
use crate::fixers::FixerOutcome;
use crate::resolve;

/// `Module '"X"' has no exported member 'Y'.` (no "Did you mean" suffix —
/// that variant is TS2614's, handled separately).
fn pattern() -> Regex {
    Regex::new(r#"Module '"([^"]+)"' has no exported member '([^']+)'\.\s*$"#)
        .expect("static pattern")
}

/// TS2305: a named import references a member the module does not export.
/// Suggests the closest actual named export and rewrites the specifier to
/// it, keeping any local alias.
pub(crate) fn fix(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(captures) = pattern().captures(issue.message.trim_end()) else {
        return FixerOutcome::Unfixable("could not parse message".into());
    };
    let module = captures.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
    let wanted = captures.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();

    let Some(importer_path) = issue.file_path.as_deref() else {
        return FixerOutcome::Unfixable("no file path on issue".into());
    };
    let Some(importer_source) = ctx.get(importer_path) else {
        return FixerOutcome::Unfixable(format!("importer file {importer_path} not available"));
    };
    if resolve::is_external(&module) {
        return FixerOutcome::Unfixable(format!("'{module}' is an external package"));
    }
    let Some(target) = resolve::resolve_existing(ctx, importer_path, &module) else {
        return FixerOutcome::Unfixable(format!("could not resolve module '{module}'"));
    };
    let Some(target_source) = ctx.get(&target) else {
        return FixerOutcome::Unfixable(format!("{target} not available"));
    };
    let target_exports = exports::parse_exports(&target_source);
    let Some(suggestion) = target_exports.closest_named(&wanted) else {
        return FixerOutcome::Unfixable(format!(
            "'{module}' has no export close enough to '{wanted}' to suggest"
        ));
    };
    let suggestion = suggestion.to_string();

    let Some(tree) = ast::parse(&importer_source) else {
        return FixerOutcome::Unfixable(format!("failed to parse {importer_path}"));
    };
    let imports = ast::find_imports(&tree, &importer_source);
    let Some(import) = find_import(&imports, &module) else {
        return FixerOutcome::Unfixable(format!("could not locate import of '{module}'"));
    };
    let Some(named) = import.named.iter().find(|n| n.imported == wanted) else {
        return FixerOutcome::Unfixable(format!("'{wanted}' is not a named specifier of this import"));
    };

    let rewritten = ast::splice(&importer_source, named.name_range, &suggestion);
    ctx.set(importer_path, rewritten);
    FixerOutcome::Fixed
}
