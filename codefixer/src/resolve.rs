use crate::context::FixCtx;

/// Path aliases the fixer knows how to expand, mirroring a typical
/// `tsconfig.json` `paths` map. Kept as a fixed table rather than parsed
/// from a real tsconfig: the fixer never guesses beyond documented rules.
const ALIASES: &[(&str, &str)] = &[("@/", "src/"), ("~/", "src/")];

const CANDIDATE_SUFFIXES: &[&str] =
    &["", ".ts", ".tsx", ".js", ".jsx", "/index.ts", "/index.tsx"];

/// Returns `true` when `module` has no project-local resolution path at all
/// (a bare package specifier such as `react` or `@acme/ui`).
pub(crate) fn is_external(module: &str) -> bool {
    !module.starts_with('.') && !ALIASES.iter().any(|(prefix, _)| module.starts_with(prefix))
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn base_candidate(importer_path: &str, module: &str) -> Option<String> {
    if let Some(rest) = module.strip_prefix('.') {
        let dir = importer_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let joined = format!("{dir}/{rest}", rest = rest.trim_start_matches('/'));
        return Some(normalize(&joined));
    }
    for (prefix, replacement) in ALIASES {
        if let Some(rest) = module.strip_prefix(prefix) {
            return Some(normalize(&format!("{replacement}{rest}")));
        }
    }
    None
}

/// Attempts to resolve `module` (as written in an import in `importer_path`)
/// to an existing project file, trying the conventional TypeScript
/// resolution suffixes. Returns the resolved path if found.
pub(crate) fn resolve_existing(ctx: &FixCtx, importer_path: &str, module: &str) -> Option<String> {
    let base = base_candidate(importer_path, module)?;
    for suffix in CANDIDATE_SUFFIXES {
        let candidate = format!("{base}{suffix}");
        if ctx.get(&candidate).is_some() {
            return Some(candidate);
        }
    }
    None
}

/// Like [`resolve_existing`] but also returns a path to use for a
/// synthesized stub when nothing exists yet (always `<base>.ts`).
pub(crate) fn stub_path(importer_path: &str, module: &str) -> Option<String> {
    base_candidate(importer_path, module).map(|base| format!("{base}.ts"))
}

/// Rewrites a resolved absolute-from-root path back into the import
/// specifier form the importer should use: relative (`./…`/`../…`) if the
/// original was relative, alias-prefixed if the original used an alias.
pub(crate) fn specifier_for(importer_path: &str, module: &str, resolved_path: &str) -> String {
    let without_ext = resolved_path
        .strip_suffix(".tsx")
        .or_else(|| resolved_path.strip_suffix(".ts"))
        .unwrap_or(resolved_path);
    let without_index = without_ext.strip_suffix("/index").unwrap_or(without_ext);

    if module.starts_with('.') {
        let importer_dir = importer_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        relative_from(importer_dir, without_index)
    } else {
        for (prefix, replacement) in ALIASES {
            if module.starts_with(prefix) {
                if let Some(rest) = without_index.strip_prefix(replacement) {
                    return format!("{prefix}{rest}");
                }
            }
        }
        without_index.to_string()
    }
}

fn relative_from(from_dir: &str, to_path: &str) -> String {
    let from_parts: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();

    let mut common = 0;
    while common < from_parts.len()
        && common < to_parts.len() - 1
        && from_parts[common] == to_parts[common]
    {
        common += 1;
    }

    let mut rel_parts: Vec<String> = Vec::new();
    for _ in common..from_parts.len() {
        rel_parts.push("..".to_string());
    }
    rel_parts.extend(to_parts[common..].iter().map(|s| s.to_string()));

    let joined = rel_parts.join("/");
    if joined.starts_with('.') {
        joined
    } else {
        format!("./{joined}")
    }
}
