//! A pure classifier over accumulated runtime errors. No sandbox or
//! inference calls — this module is just a function, unit-tested
//! table-driven per decision bucket.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    pub file_path: Option<String>,
    pub stack_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelDecision {
    None,
    CodeReview,
    PhaseLoop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelFinding {
    pub summary: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelReport {
    pub decision: SentinelDecision,
    pub errors: Vec<SentinelFinding>,
}

/// Deduplicates by `(message, filePath|stackHash)`, then decides whether the
/// remaining errors are systemic (spread across modules, or unattributable
/// to any file — i.e. blocking bootstrap) or local to a single file.
pub fn classify(errors: &[RuntimeError]) -> SentinelReport {
    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for error in errors {
        let key = (
            error.message.clone(),
            error.file_path.clone().or_else(|| error.stack_hash.clone()),
        );
        if seen.insert(key) {
            deduped.push(error);
        }
    }

    if deduped.is_empty() {
        return SentinelReport { decision: SentinelDecision::None, errors: Vec::new() };
    }

    let distinct_files: HashSet<&str> =
        deduped.iter().filter_map(|e| e.file_path.as_deref()).collect();
    let unattributable = deduped.iter().any(|e| e.file_path.is_none());
    let systemic = unattributable || distinct_files.len() > 1;

    let findings = deduped
        .into_iter()
        .map(|e| SentinelFinding { summary: e.message.clone(), file_path: e.file_path.clone() })
        .collect();

    SentinelReport {
        decision: if systemic { SentinelDecision::PhaseLoop } else { SentinelDecision::CodeReview },
        errors: findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(message: &str, file_path: Option<&str>) -> RuntimeError {
        RuntimeError {
            message: message.to_string(),
            file_path: file_path.map(str::to_string),
            stack_hash: None,
        }
    }

    #[test]
    fn empty_input_is_none() {
        assert_eq!(classify(&[]).decision, SentinelDecision::None);
    }

    #[test]
    fn single_file_errors_are_code_review() {
        let errors = vec![
            err("TypeError: x is undefined", Some("src/app.ts")),
            err("TypeError: x is undefined", Some("src/app.ts")),
        ];
        let report = classify(&errors);
        assert_eq!(report.decision, SentinelDecision::CodeReview);
        assert_eq!(report.errors.len(), 1, "duplicate should be deduplicated");
    }

    #[test]
    fn errors_across_modules_are_phase_loop() {
        let errors = vec![
            err("cannot import module a", Some("src/a.ts")),
            err("cannot import module b", Some("src/b.ts")),
        ];
        assert_eq!(classify(&errors).decision, SentinelDecision::PhaseLoop);
    }

    #[test]
    fn unattributable_errors_are_phase_loop() {
        let errors = vec![err("sandbox failed to boot", None)];
        assert_eq!(classify(&errors).decision, SentinelDecision::PhaseLoop);
    }
}
