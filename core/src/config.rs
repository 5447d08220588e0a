//! Layered configuration for the session agent and its pipeline: a
//! `Default` baseline plus named override fields, no on-disk TOML loading
//! (the external collaborator that owns deployment-wide config is out of
//! scope here).

/// Safety bounds and tunables for one agent's phase pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLimits {
    /// Total model-based review iterations across one phase's fix loop.
    pub max_review_cycles: usize,
    /// Deterministic-fixer + static-analysis re-run iterations within one
    /// phase before falling back to a model-based fix turn.
    pub max_validate_iterations: usize,
    /// Safety bound on blueprint length; the blueprint itself is
    /// authoritative, this only rejects pathological inputs.
    pub max_phases: usize,
    /// Sandbox call retry attempts before surfacing a transient error.
    pub max_sandbox_retries: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_review_cycles: 10,
            max_validate_iterations: 3,
            max_phases: 64,
            max_sandbox_retries: 3,
        }
    }
}

/// Per-agent configuration, including the pipeline bounds and the
/// per-subscriber backpressure policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub limits: PipelineLimits,
    /// Pending messages a subscriber may accumulate before the agent starts
    /// dropping non-essential streaming chunks for it.
    pub backpressure_high_water_mark: usize,
    /// Cap on the `clientReportedErrors` ring buffer.
    pub client_error_ring_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            limits: PipelineLimits::default(),
            backpressure_high_water_mark: 64,
            client_error_ring_capacity: 256,
        }
    }
}
