use serde::Deserialize;
use serde::Serialize;

/// A modification request enqueued by the conversation processor's
/// `edit_app` tool call, or directly by a client. Drained only at phase
/// boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRequest {
    pub text: String,
}

/// Client → agent wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Start or resume the phase loop.
    GenerateAll,

    StopGeneration,

    ResumeGeneration,

    /// Request a preview redeploy.
    Preview,

    /// Request permanent deployment.
    Deploy { instance_id: String },

    /// Routed to the conversation processor.
    UserMessage { message: String },

    /// Browser-side runtime errors.
    ClientErrorReport { errors: Vec<ClientErrorReportItem> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientErrorReportItem {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}
