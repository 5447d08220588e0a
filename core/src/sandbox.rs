//! Contract for the sandbox a session agent drives. This crate defines only
//! the trait; the sandbox runtime itself is an out-of-scope external
//! collaborator. Shaped like a remote exec/tool-call client, narrowed from
//! "run one shell command" down to the smaller set of operations the phase
//! pipeline actually needs.

use async_trait::async_trait;

use appforge_protocol::StaticAnalysisIssue;

use crate::error::Result;

/// Output of a sandbox command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of a static-analysis pass: lint + typecheck diagnostics plus any
/// runtime errors the sandbox has accumulated since last asked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAnalysisResult {
    pub issues: Vec<StaticAnalysisIssue>,
    pub runtime_errors: Vec<String>,
}

impl StaticAnalysisResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.runtime_errors.is_empty()
    }
}

/// One sandbox instance is exclusive per agent; this trait is the seam an
/// agent holds a handle to.
#[async_trait]
pub trait SandboxClient: Send + Sync {
    /// Installs the named template's seed files, returning the sandbox
    /// session id the agent should persist as `sandboxSessionId`.
    async fn bootstrap(&self, template_name: &str) -> Result<String>;

    async fn write_file(&self, session_id: &str, path: &str, contents: &str) -> Result<()>;

    async fn read_file(&self, session_id: &str, path: &str) -> Result<Option<String>>;

    async fn run_command(&self, session_id: &str, command: &str) -> Result<CommandOutput>;

    /// Lint + typecheck, plus any runtime errors accumulated since the
    /// session started.
    async fn static_analysis(&self, session_id: &str) -> Result<StaticAnalysisResult>;

    /// Publishes the current file set, returning the preview URL and
    /// optional tunnel URL.
    async fn deploy_preview(&self, session_id: &str) -> Result<DeployResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub preview_url: String,
    pub tunnel_url: Option<String>,
}
