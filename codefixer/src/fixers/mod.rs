pub(crate) mod ts2304;
pub(crate) mod ts2305;
pub(crate) mod ts2307;
pub(crate) mod ts2613;
pub(crate) mod ts2724;

use appforge_protocol::StaticAnalysisIssue;

use crate::context::FixCtx;

pub(crate) enum FixerOutcome {
    Fixed,
    Unfixable(String),
}

pub(crate) type FixerFn = fn(&FixCtx, &StaticAnalysisIssue) -> FixerOutcome;

/// Locates the import statement in `source` whose module specifier is
/// `module`, shared by every fixer that rewrites an import line.
pub(crate) fn find_import<'a>(
    imports: &'a [crate::ast::ImportStatement],
    module: &str,
) -> Option<&'a crate::ast::ImportStatement> {
    imports.iter().find(|stmt| stmt.module == module)
}
