//! Deterministic, model-free repair of common TypeScript compiler
//! diagnostics (`TS2307`, `TS2613`, `TS2614`, `TS2304`, `TS2305`, `TS2724`).
//!
//! Every fixer is a pure function over a project snapshot: same files, same
//! issues in, same files out, every time. No inference call is made here —
//! this is the layer the phase executor runs before ever asking a model to
//! look at an error.

mod ast;
mod context;
mod exports;
mod fixers;
mod path_policy;
mod registry;
mod resolve;

pub use context::FileFetcher;
pub use context::NoopFetcher;
pub use path_policy::can_modify_file;

use std::collections::BTreeMap;

use appforge_protocol::StaticAnalysisIssue;

use crate::context::FixCtx;
use crate::fixers::FixerOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIssue {
    pub issue: StaticAnalysisIssue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfixableIssue {
    pub issue: StaticAnalysisIssue,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub files: BTreeMap<String, String>,
    pub fixed: Vec<FixedIssue>,
    pub unfixable: Vec<UnfixableIssue>,
}

/// Applies every fixer it can to `issues` against `files`, in order,
/// threading a single mutable working set through the whole run so a fix to
/// one issue is visible to the next (last-write-wins on a given path).
/// Issues with no registered fixer, or whose target path escapes the
/// project boundary, come back as [`UnfixableIssue`] rather than being
/// silently dropped.
pub fn fix_project_issues(
    files: BTreeMap<String, String>,
    issues: &[StaticAnalysisIssue],
    fetcher: &dyn FileFetcher,
) -> FixOutcome {
    let ctx = FixCtx::new(files, fetcher);
    let mut fixed = Vec::new();
    let mut unfixable = Vec::new();

    for issue in issues {
        if let Some(path) = &issue.file_path {
            if !path_policy::can_modify_file(path) {
                unfixable.push(UnfixableIssue {
                    issue: issue.clone(),
                    reason: format!("{path} is outside the writable project boundary"),
                });
                continue;
            }
        }

        let Some(fixer) = registry::lookup(&issue.rule_id) else {
            unfixable.push(UnfixableIssue {
                issue: issue.clone(),
                reason: format!("no deterministic fixer registered for {}", issue.rule_id),
            });
            continue;
        };

        match fixer(&ctx, issue) {
            FixerOutcome::Fixed => fixed.push(FixedIssue { issue: issue.clone() }),
            FixerOutcome::Unfixable(reason) => {
                unfixable.push(UnfixableIssue { issue: issue.clone(), reason })
            }
        }
    }

    FixOutcome { files: ctx.into_files(), fixed, unfixable }
}
