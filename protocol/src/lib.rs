//! Wire protocol and durable data model shared between the session agent
//! (`appforge-core`) and its subscribed clients.
//!
//! Mirrors a submission/event split between a client and an agent, adapted
//! to this system's duplex stream: `Command` carries client → agent
//! messages, `Event` carries agent → client messages.

mod command;
mod event;
mod ids;
mod issues;
mod state;

pub use command::ClientErrorReportItem;
pub use command::Command;
pub use command::ModificationRequest;
pub use event::Event;
pub use event::OutputType;
pub use event::RateLimitErrorPayload;
pub use event::TerminalEventKind;
pub use ids::AgentId;
pub use issues::StaticAnalysisIssue;
pub use state::AgentStateSnapshot;
pub use state::Blueprint;
pub use state::ClientReportedError;
pub use state::ConversationMessage;
pub use state::DevState;
pub use state::GeneratedFile;
pub use state::GeneratedPhase;
pub use state::Phase;
pub use state::PhaseFile;
pub use state::Role;
pub use state::TemplateDetails;
