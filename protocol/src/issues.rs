use serde::Deserialize;
use serde::Serialize;

/// A single diagnostic produced by sandbox static analysis, a runtime error
/// report, or a client error report, normalized to the shape the code fixer
/// and sentinel both consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAnalysisIssue {
    /// Compiler/linter diagnostic code, e.g. "TS2307". Empty when the issue
    /// did not come with one (e.g. a synthesized runtime error).
    pub rule_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl StaticAnalysisIssue {
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            message: message.into(),
            file_path: None,
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}
