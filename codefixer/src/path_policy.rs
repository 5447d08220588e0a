//! Guards every write the fixer performs: nothing outside the project root,
//! no escaping via `..`, no touching the package manager's own directories.
//!
//! Modeled on a writable-roots check, generalized from "inside the
//! sandbox's approved roots" to "inside the project boundary".

const DENYLISTED_PREFIXES: &[&str] = &["node_modules/", ".git/", "dist/", "build/"];

/// Returns `true` if `path` is a project-relative path the fixer is allowed
/// to create or modify.
pub fn can_modify_file(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    if path.starts_with('/') {
        return false;
    }
    if path.split('/').any(|segment| segment == "..") {
        return false;
    }
    !DENYLISTED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_ordinary_project_relative_paths() {
        assert!(can_modify_file("src/components/widget.tsx"));
        assert!(can_modify_file("src/lib.ts"));
    }

    #[test]
    fn rejects_escapes_and_absolute_paths() {
        assert!(!can_modify_file("../outside.ts"));
        assert!(!can_modify_file("/etc/passwd"));
        assert!(!can_modify_file("src/../../etc/passwd"));
    }

    #[test]
    fn rejects_denylisted_directories() {
        assert!(!can_modify_file("node_modules/react/index.js"));
        assert!(!can_modify_file(".git/config"));
    }
}
