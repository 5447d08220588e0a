// Regex patterns here are fixed string literals; a failed compile is a
// programmer error caught in tests, not a runtime condition.
#![allow(clippy::expect_used)]

use appforge_protocol::StaticAnalysisIssue;
use regex_lite::Regex;

use crate::ast;
use crate::context::FixCtx;
use crate::fixers::FixerOutcome;

/// `Cannot find name 'X'.`
fn pattern() -> Regex {
    Regex::new(r"Cannot find name '([^']+)'").expect("static pattern")
}

/// Well-known global identifiers. A missing declaration for one of these
/// means a `lib`/`tsconfig` gap, not a missing local symbol — the fixer
/// declines rather than shadow a global with a placeholder.
const KNOWN_GLOBALS: &[&str] = &[
    "console", "window", "document", "process", "Buffer", "require", "module",
    "exports", "global", "globalThis", "Promise", "Array", "Object", "Map",
    "Set", "WeakMap", "WeakSet", "Error", "TypeError", "RangeError", "Symbol",
    "Proxy", "Reflect", "JSON", "Math", "Date", "RegExp", "Number", "String",
    "Boolean", "Infinity", "NaN", "undefined", "fetch", "setTimeout",
    "clearTimeout", "setInterval", "clearInterval",
];

#[derive(Debug, PartialEq, Eq)]
enum UsageShape {
    JsxComponent,
    Constructed,
    AssignmentTarget,
    EnumLike,
    Called,
    MemberAccessed,
    TypePosition,
    Value,
}

/// Variant names found in `Name.Variant`-shaped accesses, used to emit a
/// concrete enum placeholder instead of a generic one.
fn enum_variants(source: &str, name: &str) -> Vec<String> {
    let variant = Regex::new(&format!(r"\b{}\.([A-Z][A-Za-z0-9_]*)\b", regex_lite::escape(name)))
        .expect("enum variant pattern");
    let mut seen = Vec::new();
    for captures in variant.captures_iter(source) {
        let Some(m) = captures.get(1) else { continue };
        let variant = m.as_str().to_string();
        if !seen.contains(&variant) {
            seen.push(variant);
        }
    }
    seen
}

fn classify(source: &str, name: &str) -> UsageShape {
    let jsx = Regex::new(&format!(r"<{}[\s/>]", regex_lite::escape(name))).expect("jsx pattern");
    if jsx.is_match(source) {
        return UsageShape::JsxComponent;
    }
    let constructed =
        Regex::new(&format!(r"\bnew\s+{}\s*\(", regex_lite::escape(name))).expect("new pattern");
    if constructed.is_match(source) {
        return UsageShape::Constructed;
    }
    // A bare `Name =` that is not `==`/`===` is an assignment target, not a
    // declaration; checked before type position so `Name: T = Name2` style
    // annotations don't shadow a plain reassignment.
    let assigned =
        Regex::new(&format!(r"\b{}\s*=[^=]", regex_lite::escape(name))).expect("assignment pattern");
    if assigned.is_match(source) {
        return UsageShape::AssignmentTarget;
    }
    let type_position =
        Regex::new(&format!(r":\s*{}\b", regex_lite::escape(name))).expect("type pattern");
    if type_position.is_match(source) {
        return UsageShape::TypePosition;
    }
    let called = Regex::new(&format!(r"\b{}\s*\(", regex_lite::escape(name))).expect("call pattern");
    if called.is_match(source) {
        return UsageShape::Called;
    }
    // Dot access against a capitalized member (`Name.Red`) reads as an enum
    // variant reference rather than ordinary object member access
    // (`Name.foo()`), which stays lowercase-first in idiomatic TS/JS.
    if !enum_variants(source, name).is_empty() {
        return UsageShape::EnumLike;
    }
    let member = Regex::new(&format!(r"\b{}\.", regex_lite::escape(name))).expect("member pattern");
    if member.is_match(source) {
        return UsageShape::MemberAccessed;
    }
    UsageShape::Value
}

fn placeholder_for(shape: &UsageShape, name: &str, source: &str) -> String {
    match shape {
        UsageShape::JsxComponent => {
            format!("function {name}(props: Record<string, unknown>): null {{\n  return null;\n}}\n")
        }
        UsageShape::Constructed => format!("class {name} {{}}\n"),
        UsageShape::AssignmentTarget => format!("let {name}: unknown;\n"),
        UsageShape::EnumLike => {
            let variants = enum_variants(source, name);
            let variants = if variants.is_empty() { vec!["Unknown".to_string()] } else { variants };
            let body = variants.join(",\n  ");
            format!("enum {name} {{\n  {body},\n}}\n")
        }
        UsageShape::Called => {
            format!("function {name}(...args: unknown[]): unknown {{\n  return undefined;\n}}\n")
        }
        UsageShape::MemberAccessed => format!("const {name}: Record<string, unknown> = {{}};\n"),
        UsageShape::TypePosition => format!("type {name} = unknown;\n"),
        UsageShape::Value => format!("const {name}: unknown = undefined;\n"),
    }
}

/// TS2304: an identifier is used with no declaration in scope anywhere in the
/// project. Classifies how the name is used (JSX tag, constructor,
/// assignment target, enum-like dot access, call, member access, type
/// position, or bare value) and injects a minimal placeholder declaration
/// immediately after the file's imports.
pub(crate) fn fix(ctx: &FixCtx, issue: &StaticAnalysisIssue) -> FixerOutcome {
    let Some(name) = pattern()
        .captures(&issue.message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return FixerOutcome::Unfixable("could not parse identifier from message".into());
    };
    if KNOWN_GLOBALS.contains(&name.as_str()) {
        return FixerOutcome::Unfixable(format!(
            "'{name}' is a well-known global; likely a missing lib/tsconfig setting"
        ));
    }
    let Some(file_path) = issue.file_path.as_deref() else {
        return FixerOutcome::Unfixable("no file path on issue".into());
    };
    let Some(source) = ctx.get(file_path) else {
        return FixerOutcome::Unfixable(format!("{file_path} not available"));
    };
    let Some(tree) = ast::parse(&source) else {
        return FixerOutcome::Unfixable(format!("failed to parse {file_path}"));
    };

    if source.contains(&format!("function {name}"))
        || source.contains(&format!("class {name}"))
        || source.contains(&format!("const {name}"))
        || source.contains(&format!("let {name}"))
        || source.contains(&format!("type {name}"))
        || source.contains(&format!("enum {name}"))
    {
        return FixerOutcome::Unfixable(format!("'{name}' already has a declaration in this file"));
    }

    let shape = classify(&source, &name);
    let declaration = placeholder_for(&shape, &name, &source);
    let offset = ast::end_of_imports(&tree);
    let separator = if offset == 0 { "" } else { "\n" };
    let insertion = format!("{separator}\n{declaration}");
    let rewritten = ast::splice(&source, (offset, offset), &insertion);
    ctx.set(file_path, rewritten);
    FixerOutcome::Fixed
}
