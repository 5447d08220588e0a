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

/// `Module '"X"' has no default export.`
fn no_default_pattern() -> Regex {
    Regex::new(r#"Module '"([^"]+)"' has no default export"#).expect("static pattern")
}

/// `Module '"X"' has no exported member 'Y'. Did you mean to use 'import Y from "X"' instead?`
fn use_default_instead_pattern() -> Regex {
    Regex::new(
        r#"Module '"([^"]+)"' has no exported member '([^']+)'\. Did you mean to use 'import [^']+ from "[^"]+"' instead\?"#,
    )
    .expect("static pattern")
}

fn target_path(ctx: &FixCtx, importer_path: &str, module: &str) -> Option<String> {
    if resolve::is_external(module) {
        return None;
    }
    resolve::resolve_existing(ctx, importer_path, module)
}

/// TS2613: an `import Foo from "X"` default import, but `X` has no default
/// export. Rewrites it to a named (or namespace) import that actually
/// matches `X`'s surface.
pub(crate) fn fix(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(module) = no_default_pattern()
        .captures(&issue.message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return FixerOutcome::Unfixable("could not parse module from message".into());
    };
    let Some(importer_path) = issue.file_path.as_deref() else {
        return FixerOutcome::Unfixable("no file path on issue".into());
    };
    let Some(importer_source) = ctx.get(importer_path) else {
        return FixerOutcome::Unfixable(format!("importer file {importer_path} not available"));
    };
    let Some(target) = target_path(ctx, importer_path, &module) else {
        return FixerOutcome::Unfixable(format!("could not resolve module '{module}'"));
    };
    let Some(target_source) = ctx.get(&target) else {
        return FixerOutcome::Unfixable(format!("{target} not available"));
    };
    let target_exports = exports::parse_exports(&target_source);

    let Some(tree) = ast::parse(&importer_source) else {
        return FixerOutcome::Unfixable(format!("failed to parse {importer_path}"));
    };
    let imports = ast::find_imports(&tree, &importer_source);
    let Some(import) = find_import(&imports, &module) else {
        return FixerOutcome::Unfixable(format!("could not locate import of '{module}'"));
    };
    let Some((local_name, default_range)) = import.default.clone() else {
        return FixerOutcome::Unfixable("import has no default specifier to rewrite".into());
    };

    let replacement = if target_exports
        .named
        .iter()
        .any(|n| n == &local_name)
    {
        format!("{{ {local_name} }}")
    } else if let Some(first) = target_exports.named.first() {
        if first == &local_name {
            format!("{{ {first} }}")
        } else {
            format!("{{ {first} as {local_name} }}")
        }
    } else {
        return FixerOutcome::Unfixable(format!("'{module}' has no named exports to fall back to"));
    };

    let rewritten = ast::splice(&importer_source, default_range, &replacement);
    ctx.set(importer_path, rewritten);
    FixerOutcome::Fixed
}

/// TS2614: an `import { Foo } from "X"` named import, but `X` only exports a
/// default. Rewrites the named specifier to a plain default import.
pub(crate) fn fix_use_default_instead(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(captures) = use_default_instead_pattern().captures(&issue.message) else {
        return FixerOutcome::Unfixable("could not parse message".into());
    };
    let module = captures.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
    let member = captures.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();

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
    let Some(named) = import.named.iter().find(|n| n.imported == member) else {
        return FixerOutcome::Unfixable(format!("'{member}' is not a named specifier of this import"));
    };

    // Replace just this one specifier's surrounding named-import block when it
    // is the sole specifier; otherwise leave siblings alone and only patch
    // this member's slot with the plain default form is ambiguous inside a
    // shared `{ ... }` block, so require it to be the only specifier.
    if import.named.len() != 1 || import.default.is_some() {
        return FixerOutcome::Unfixable(
            "default-instead rewrite only supported for a sole named specifier".into(),
        );
    }
    let Some(block_range) = import.named_block_range else {
        return FixerOutcome::Unfixable("missing named import block".into());
    };
    let replacement = named.local.clone();
    let rewritten = ast::splice(&importer_source, block_range, &replacement);
    ctx.set(importer_path, rewritten);
    FixerOutcome::Fixed
}
