use serde::Deserialize;
use serde::Serialize;

use crate::state::AgentStateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Stdout,
    Stderr,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalEventKind {
    Started,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitErrorPayload {
    pub message: String,
    pub limit_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub suggestions: Vec<String>,
}

/// Agent → client wire messages. Every state-change or streaming chunk is
/// serialized to one of these variants and fanned out to all subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CfAgentState { state: AgentStateSnapshot },

    FileGenerating { file_path: String },
    FileChunkGenerated { file_path: String, chunk: String },
    FileGenerated { file_path: String, file_contents: String },
    FileRegenerating { file_path: String },
    FileRegenerated { file_path: String, file_contents: String },

    GenerationStarted { total_files: usize },
    GenerationComplete,
    GenerationStopped,
    GenerationResumed,

    PhaseImplementing { message: String, phase_name: String },
    PhaseValidating { message: String },
    PhaseValidated { message: String },
    PhaseImplemented { message: String, phase_name: String },
    PhaseGenerating { message: String },
    PhaseGenerated { message: String },

    CodeReviewing {
        static_analysis_issue_count: usize,
        runtime_error_count: usize,
        client_error_count: usize,
    },
    CodeReviewed { issues_found: bool, files_to_fix: Vec<String> },

    DeploymentStarted,
    DeploymentCompleted { preview_url: String, tunnel_url: Option<String> },

    RuntimeErrorFound { count: usize, errors: Vec<String> },

    ConversationResponse { conversation_id: String, message: String, is_streaming: bool },

    TerminalOutput { output: String, output_type: OutputType, timestamp: i64 },
    ServerLog { message: String, level: String, timestamp: i64, source: Option<String> },

    Error { error: String },
    RateLimitError { error: RateLimitErrorPayload },

    CloudflareDeploymentStarted,
    CloudflareDeploymentCompleted { preview_url: String },
    CloudflareDeploymentError { error: String },
}
