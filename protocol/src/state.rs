use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// High-level phase of the session agent's state machine.
///
/// `Implementing`/`Validating`/`Fixing` are the three sub-states of the
/// phase loop — there is no separate `PhaseLoop` variant, because the
/// phase loop names a control-flow shape, not a state `AgentState` can
/// hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevState {
    Idle,
    Bootstrapping,
    Blueprinting,
    Implementing,
    Validating,
    Fixing,
    Deploying,
    Paused,
    Terminal,
}

impl DevState {
    /// True for the states that imply exactly one phase execution is in
    /// flight.
    pub fn is_phase_in_flight(self) -> bool {
        matches!(self, DevState::Implementing | DevState::Validating | DevState::Fixing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DevState::Terminal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFile {
    pub path: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub description: String,
    pub files: Vec<PhaseFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub title: String,
    pub description: String,
    pub frameworks: Vec<String>,
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDetails {
    pub name: String,
    pub files: Vec<String>,
}

/// A single entry of `generatedFilesMap`: entries are appended or
/// replaced by path, never deleted, so a later phase can never erase an
/// earlier phase's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub contents: String,
    pub last_phase_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPhase {
    pub name: String,
    pub description: String,
    pub files: Vec<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub conversation_id: String,
}

/// An error report from the browser preview, deduplicated by
/// `(message, stack_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReportedError {
    pub message: String,
    pub stack_hash: String,
}

/// Direct wire projection of `AgentState`, sent as the `cf_agent_state`
/// snapshot on subscribe. Transient fields (`generationPromise`, live
/// subscriber handles) are omitted; everything else — including
/// `sandboxSessionId` — is a straight projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStateSnapshot {
    pub query: String,
    pub blueprint: Option<Blueprint>,
    pub template_details: Option<TemplateDetails>,
    pub generated_files_map: BTreeMap<String, GeneratedFile>,
    pub generated_phases: Vec<GeneratedPhase>,
    pub conversation_messages: Vec<ConversationMessage>,
    pub pending_user_inputs: Vec<String>,
    pub should_be_generating: bool,
    pub current_dev_state: DevState,
    pub sandbox_session_id: Option<String>,
    pub client_reported_errors: Vec<ClientReportedError>,
    pub latest_preview_url: Option<String>,
}
