use std::io;

use thiserror::Error;
use tokio::task::JoinError;

use appforge_protocol::AgentId;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced by the [`crate::sandbox::SandboxClient`] contract.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("sandbox command exited with status {0}: {1}")]
    CommandFailed(i32, String),

    #[error("sandbox call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("sandbox session was not bootstrapped")]
    NotBootstrapped,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors surfaced by the [`crate::inference::InferenceClient`] contract.
///
/// Rate limiting and security errors are never retried by the core;
/// transient/schema errors get one local retry.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("rate limit exceeded: {0}")]
    RateLimited(RateLimitInfo),

    #[error("security error: {0}")]
    Security(String),

    #[error("transient inference error: {0}")]
    Transient(String),

    #[error("model returned malformed structured output: {0}")]
    Schema(String),

    #[error("fatal inference error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitInfo {
    pub limit_type: String,
    pub limit: Option<u64>,
    pub period: Option<String>,
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.limit_type)
    }
}

/// Top-level error type for the session agent and its pipeline.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("no agent with id: {0}")]
    AgentNotFound(AgentId),

    #[error("agent {0} already has a live writer")]
    AlreadyInitialized(AgentId),

    #[error("setState requires currentDevState = Idle at the target, found {0:?}")]
    SetStateRequiresIdle(appforge_protocol::DevState),

    #[error("blueprint exceeds MAX_PHASES bound ({0} > {1})")]
    TooManyPhases(usize, usize),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("agent loop died unexpectedly")]
    InternalAgentDied,

    #[error("internal invariant violated: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TokioJoin(#[from] JoinError),
}

impl AgentError {
    /// Classifies whether this error should be retried locally rather than
    /// surfaced to the client.
    pub fn is_locally_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Sandbox(SandboxError::Timeout(_))
                | AgentError::Sandbox(SandboxError::Io(_))
                | AgentError::Inference(InferenceError::Transient(_))
                | AgentError::Inference(InferenceError::Schema(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_sandbox_and_inference_errors_are_locally_recoverable() {
        assert!(AgentError::Sandbox(SandboxError::Timeout(std::time::Duration::from_secs(30)))
            .is_locally_recoverable());
        assert!(AgentError::Sandbox(SandboxError::Io(io::Error::other("boom"))).is_locally_recoverable());
        assert!(AgentError::Inference(InferenceError::Transient("network blip".to_string()))
            .is_locally_recoverable());
        assert!(AgentError::Inference(InferenceError::Schema("bad json".to_string())).is_locally_recoverable());
    }

    #[test]
    fn rate_limit_and_security_errors_are_never_locally_recoverable() {
        let rate_limited = AgentError::Inference(InferenceError::RateLimited(RateLimitInfo {
            limit_type: "tokens_per_minute".to_string(),
            limit: Some(1000),
            period: Some("minute".to_string()),
            suggestions: vec![],
        }));
        assert!(!rate_limited.is_locally_recoverable());
        assert!(!AgentError::Inference(InferenceError::Security("bad token".to_string())).is_locally_recoverable());
        assert!(!AgentError::Fatal("invariant violated".to_string()).is_locally_recoverable());
    }
}
