//! `appforge-core`: the session agent and its phase execution pipeline.
//! This crate owns the state machine, the phase executor, the sentinel
//! classifier, the conversation processor, and the sandbox/inference
//! client contracts; it depends on `appforge-codefixer` for deterministic
//! code repair and `appforge-protocol` for the wire schema and durable
//! data model.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod elapsed;
pub mod error;
pub mod inference;
pub mod persistence;
pub mod phase_executor;
pub mod registry;
pub mod sandbox;
pub mod sentinel;
mod util;

pub use agent::AgentMode;
pub use agent::AgentSummary;
pub use agent::InitializeRequest;
pub use agent::SessionAgent;
pub use config::AgentConfig;
pub use config::PipelineLimits;
pub use error::AgentError;
pub use error::Result;
pub use registry::AgentFactory;
pub use registry::AgentLocator;
pub use registry::AgentRegistry;
