//! The session agent: single-writer owner of one chat's
//! [`AgentStateSnapshot`] and its phase-loop state machine.
//!
//! State lives behind a `Mutex` so every mutation is serialized
//! regardless of which task performs it (the generation loop, a
//! conversation turn, a command handler), rather than funnelling
//! everything through one dedicated actor task. Event fan-out to
//! subscribers is a `Vec` of per-subscriber bounded channels, since more
//! than one client may read a session's event stream concurrently.

// Poisoned lock should fail the program.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use appforge_protocol::AgentId;
use appforge_protocol::AgentStateSnapshot;
use appforge_protocol::Blueprint;
use appforge_protocol::ClientReportedError;
use appforge_protocol::Command;
use appforge_protocol::ConversationMessage;
use appforge_protocol::DevState;
use appforge_protocol::Event;
use appforge_protocol::GeneratedPhase;
use appforge_protocol::RateLimitErrorPayload;
use appforge_protocol::Role;
use appforge_protocol::TemplateDetails;

use crate::config::AgentConfig;
use crate::conversation::internal_memo;
use crate::conversation::ConversationProcessor;
use crate::conversation::ConversationTurnRequest;
use crate::conversation::ProjectContext;
use crate::error::AgentError;
use crate::error::InferenceError;
use crate::error::Result;
use crate::inference::InferenceClient;
use crate::inference::StructuredOutputRequest;
use crate::persistence::StateStore;
use crate::phase_executor::EventSink;
use crate::phase_executor::PhaseExecutor;
use crate::sandbox::DeployResult;
use crate::sandbox::SandboxClient;
use crate::sentinel;
use crate::util::backoff;

/// Mode the original request was submitted under. Opaque to the pipeline
/// beyond shaping the blueprint prompt; which model/provider this implies
/// is an external concern this crate never resolves itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Deterministic,
    Smart,
}

/// Inputs to [`SessionAgent::initialize`]. Per-user hostname/inference
/// configuration is opaque to the core and never modeled here. Template
/// installation has no dedicated wire event — it's only observable
/// through `template_details` in the next `cf_agent_state` snapshot.
pub struct InitializeRequest {
    pub query: String,
    pub template_name: String,
    pub agent_mode: AgentMode,
}

/// A registered event-stream reader. One per connection.
struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Event>,
}

/// Whether an event kind may be dropped for a backpressured subscriber.
/// Lifecycle/terminal events are always preserved; high-volume streaming
/// chunks are not.
fn is_essential(event: &Event) -> bool {
    !matches!(
        event,
        Event::FileChunkGenerated { .. } | Event::TerminalOutput { .. } | Event::ServerLog { .. }
    )
}

/// Summary projection returned by `get_summary`.
#[derive(Debug, Clone)]
pub struct AgentSummary {
    pub query: String,
    pub generated_code: Vec<(String, String)>,
    pub conversation: Vec<ConversationMessage>,
}

struct Inner {
    id: AgentId,
    config: AgentConfig,
    sandbox: Arc<dyn SandboxClient>,
    inference: Arc<dyn InferenceClient>,
    conversation: ConversationProcessor,
    phase_executor: PhaseExecutor,
    store: Arc<dyn StateStore>,
    state: Mutex<AgentStateSnapshot>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscriber_id: AtomicU64,
    next_conversation_id: AtomicU64,
    /// Live, in-process mirror of `should_be_generating`, polled by the
    /// generation task between phases so `stop_generation` can take effect
    /// without tearing the task down mid file-write.
    running: AtomicBool,
    generation_task: Mutex<Option<JoinHandle<()>>>,
}

/// Owns one chat's [`AgentStateSnapshot`] and drives its pipeline.
/// Cloned cheaply (it is a thin `Arc` wrapper); every clone refers to the
/// same live writer, so there is exactly one writer per [`AgentId`] as
/// long as [`crate::registry::AgentRegistry`] hands out at most one
/// `SessionAgent` per id.
#[derive(Clone)]
pub struct SessionAgent(Arc<Inner>);

impl SessionAgent {
    pub fn new(
        id: AgentId,
        config: AgentConfig,
        sandbox: Arc<dyn SandboxClient>,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let phase_executor = PhaseExecutor::new(sandbox.clone(), inference.clone(), config.limits.clone());
        let conversation = ConversationProcessor::new(inference.clone());
        Self(Arc::new(Inner {
            id,
            config,
            sandbox,
            inference,
            conversation,
            phase_executor,
            store,
            state: Mutex::new(fresh_state()),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            next_conversation_id: AtomicU64::new(0),
            running: AtomicBool::new(false),
            generation_task: Mutex::new(None),
        }))
    }

    /// Restores an agent from a persisted snapshot (cold-start recovery).
    /// If `should_be_generating` is true and the restored state is
    /// non-terminal, the phase loop resumes automatically.
    pub fn restore(
        id: AgentId,
        config: AgentConfig,
        sandbox: Arc<dyn SandboxClient>,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn StateStore>,
        snapshot: AgentStateSnapshot,
    ) -> Self {
        let agent = Self::new(id, config, sandbox, inference, store);
        let should_resume = snapshot.should_be_generating && !snapshot.current_dev_state.is_terminal();
        *agent.0.state.lock().unwrap() = snapshot;
        if should_resume {
            agent.kick_generation();
        }
        agent
    }

    pub fn id(&self) -> &AgentId {
        &self.0.id
    }

    pub fn is_initialized(&self) -> bool {
        !self.0.state.lock().unwrap().query.is_empty()
    }

    pub fn get_full_state(&self) -> AgentStateSnapshot {
        self.0.state.lock().unwrap().clone()
    }

    pub fn get_preview_url_cache(&self) -> Option<String> {
        self.0.state.lock().unwrap().latest_preview_url.clone()
    }

    pub fn get_summary(&self) -> AgentSummary {
        let state = self.0.state.lock().unwrap();
        AgentSummary {
            query: state.query.clone(),
            generated_code: state
                .generated_files_map
                .iter()
                .map(|(path, file)| (path.clone(), file.contents.clone()))
                .collect(),
            conversation: state.conversation_messages.clone(),
        }
    }

    /// Used by fork/clone: requires `current_dev_state = Idle` at the
    /// target.
    pub fn set_state(&self, new_state: AgentStateSnapshot) -> Result<()> {
        if new_state.current_dev_state != DevState::Idle {
            return Err(AgentError::SetStateRequiresIdle(new_state.current_dev_state));
        }
        *self.0.state.lock().unwrap() = new_state;
        Ok(())
    }

    /// Registers a new client for the event stream. Authentication as
    /// owner happens out-of-band, before this is called. The returned
    /// channel is sized from `backpressure_high_water_mark`, the same bound
    /// `broadcast` checks when deciding whether to drop a non-essential
    /// event for a slow subscriber. Immediately sends a `cf_agent_state`
    /// snapshot so the client can reconstruct UI state without replay.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(self.0.config.backpressure_high_water_mark);
        let id = self.0.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let snapshot_event = Event::CfAgentState { state: self.get_full_state() };
        let _ = sender.try_send(snapshot_event);
        self.0.subscribers.lock().unwrap().push(Subscriber { id, sender });
        (id, receiver)
    }

    pub fn unsubscribe(&self, subscriber_id: u64) {
        self.0.subscribers.lock().unwrap().retain(|s| s.id != subscriber_id);
    }

    /// Bootstraps the sandbox and produces a blueprint for a brand new
    /// chat. Idempotent: returns the existing state if already
    /// initialized, never re-bootstraps or re-blueprints.
    pub async fn initialize(&self, request: InitializeRequest) -> Result<AgentStateSnapshot> {
        if self.is_initialized() {
            return Ok(self.get_full_state());
        }

        {
            let mut state = self.0.state.lock().unwrap();
            state.query = request.query.clone();
            state.current_dev_state = DevState::Bootstrapping;
        }
        self.persist().await;
        info!(agent_id = %self.0.id, "bootstrapping from template {}", request.template_name);

        let session_id = self.0.sandbox.bootstrap(&request.template_name).await?;
        {
            let mut state = self.0.state.lock().unwrap();
            state.sandbox_session_id = Some(session_id);
            state.template_details = Some(TemplateDetails {
                name: request.template_name.clone(),
                files: Vec::new(),
            });
            state.current_dev_state = DevState::Blueprinting;
        }
        self.persist().await;

        let blueprint = self.generate_blueprint(&request).await?;
        if blueprint.phases.len() > self.0.config.limits.max_phases {
            let count = blueprint.phases.len();
            let max = self.0.config.limits.max_phases;
            self.transition(DevState::Terminal).await;
            return Err(AgentError::TooManyPhases(count, max));
        }

        {
            let mut state = self.0.state.lock().unwrap();
            state.blueprint = Some(blueprint);
            state.current_dev_state = DevState::Idle;
            state.should_be_generating = true;
        }
        self.persist().await;

        self.kick_generation();
        Ok(self.get_full_state())
    }

    async fn generate_blueprint(&self, request: &InitializeRequest) -> Result<Blueprint> {
        let mode = match request.agent_mode {
            AgentMode::Deterministic => "deterministic",
            AgentMode::Smart => "smart",
        };
        let prompt = format!(
            "Produce a blueprint ({{ title, description, frameworks[], phases[] }}) for: {} (mode: {mode})",
            request.query
        );
        let response = self
            .0
            .inference
            .structured_output(
                StructuredOutputRequest { prompt, schema_name: "blueprint".to_string() },
                None,
            )
            .await?;
        serde_json::from_value(response)
            .map_err(|e| AgentError::Fatal(format!("blueprint response did not match schema: {e}")))
    }

    /// Accepts a typed client → agent command.
    pub async fn command(&self, command: Command) {
        match command {
            Command::GenerateAll | Command::ResumeGeneration => {
                {
                    let mut state = self.0.state.lock().unwrap();
                    state.should_be_generating = true;
                }
                self.persist().await;
                self.kick_generation();
                self.broadcast(Event::GenerationResumed);
            }
            Command::StopGeneration => {
                self.0.running.store(false, Ordering::SeqCst);
                let mut state = self.0.state.lock().unwrap();
                state.should_be_generating = false;
            }
            Command::Preview => {
                let agent = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = agent.deploy_to_sandbox().await {
                        error!(agent_id = %agent.0.id, error = %e, "preview deploy failed");
                    }
                });
            }
            Command::Deploy { instance_id } => {
                let agent = self.clone();
                tokio::spawn(async move {
                    agent.broadcast(Event::CloudflareDeploymentStarted);
                    match agent.deploy_to_sandbox().await {
                        Ok(result) => {
                            agent.broadcast(Event::CloudflareDeploymentCompleted {
                                preview_url: result.preview_url,
                            });
                        }
                        Err(e) => {
                            agent.broadcast(Event::CloudflareDeploymentError { error: e.to_string() });
                        }
                    }
                    debug!(instance_id, "permanent deployment dispatched");
                });
            }
            Command::UserMessage { message } => self.spawn_conversation_turn(message),
            Command::ClientErrorReport { errors } => self.ingest_client_errors(errors),
        }
    }

    fn ingest_client_errors(&self, errors: Vec<appforge_protocol::ClientErrorReportItem>) {
        let cap = self.0.config.client_error_ring_capacity;
        let runtime_errors: Vec<sentinel::RuntimeError> = {
            let mut state = self.0.state.lock().unwrap();
            for item in &errors {
                let stack_hash = item.stack.as_deref().map(stack_hash).unwrap_or_default();
                let reported = ClientReportedError { message: item.message.clone(), stack_hash };
                if !state.client_reported_errors.iter().any(|e| *e == reported) {
                    state.client_reported_errors.push(reported);
                    if state.client_reported_errors.len() > cap {
                        state.client_reported_errors.remove(0);
                    }
                }
            }
            state
                .client_reported_errors
                .iter()
                .map(|e| sentinel::RuntimeError {
                    message: e.message.clone(),
                    file_path: None,
                    stack_hash: Some(e.stack_hash.clone()),
                })
                .collect()
        };

        let report = sentinel::classify(&runtime_errors);
        self.broadcast(Event::RuntimeErrorFound {
            count: report.errors.len(),
            errors: report.errors.iter().map(|f| f.summary.clone()).collect(),
        });

        if report.decision == sentinel::SentinelDecision::PhaseLoop && !self.0.running.load(Ordering::SeqCst) {
            let mut state = self.0.state.lock().unwrap();
            if let Some(last) = state.generated_phases.last_mut() {
                last.completed = false;
            }
            state.should_be_generating = true;
            drop(state);
            self.kick_generation();
        }
    }

    fn spawn_conversation_turn(&self, message: String) {
        let agent = self.clone();
        let conversation_id =
            format!("conv-{}", agent.0.next_conversation_id.fetch_add(1, Ordering::SeqCst));
        tokio::spawn(async move {
            let (past_messages, context) = {
                let state = agent.0.state.lock().unwrap();
                let context = ProjectContext {
                    blueprint_title: state.blueprint.as_ref().map(|b| b.title.clone()),
                    current_phase_name: state
                        .generated_phases
                        .iter()
                        .rev()
                        .find(|p| !p.completed)
                        .map(|p| p.name.clone()),
                };
                (state.conversation_messages.clone(), context)
            };

            {
                let mut state = agent.0.state.lock().unwrap();
                state.conversation_messages.push(ConversationMessage {
                    role: Role::User,
                    content: message.clone(),
                    conversation_id: conversation_id.clone(),
                });
            }

            let request = ConversationTurnRequest {
                conversation_id: conversation_id.clone(),
                user_message: message,
                past_messages,
                context,
            };

            let agent_for_chunk = agent.clone();
            let conversation_id_for_chunk = conversation_id.clone();
            let mut on_chunk = move |chunk: &str| {
                agent_for_chunk.broadcast(Event::ConversationResponse {
                    conversation_id: conversation_id_for_chunk.clone(),
                    message: chunk.to_string(),
                    is_streaming: true,
                });
            };

            match agent.0.conversation.process_turn(request, Some(&mut on_chunk)).await {
                Ok(outcome) => {
                    {
                        let mut state = agent.0.state.lock().unwrap();
                        state.conversation_messages.push(outcome.assistant_message.clone());
                        for modification in outcome.modification_requests {
                            state.pending_user_inputs.push(modification.text);
                        }
                    }
                    agent.persist().await;
                    agent.broadcast(Event::ConversationResponse {
                        conversation_id,
                        message: outcome.assistant_message.content,
                        is_streaming: false,
                    });
                }
                Err(AgentError::Inference(InferenceError::RateLimited(info))) => {
                    agent.broadcast(Event::RateLimitError {
                        error: RateLimitErrorPayload {
                            message: "rate limit exceeded".to_string(),
                            limit_type: info.limit_type,
                            limit: info.limit,
                            period: info.period,
                            suggestions: info.suggestions,
                        },
                    });
                }
                Err(e) => {
                    warn!(agent_id = %agent.0.id, error = %e, "conversation turn failed");
                    agent.broadcast(Event::Error { error: e.to_string() });
                }
            }
        });
    }

    /// Publishes the current file set; returns the preview URL.
    pub async fn deploy_to_sandbox(&self) -> Result<DeployResult> {
        let session_id = {
            let state = self.0.state.lock().unwrap();
            state.sandbox_session_id.clone().ok_or(AgentError::Sandbox(crate::error::SandboxError::NotBootstrapped))?
        };
        self.broadcast(Event::DeploymentStarted);
        match self.0.sandbox.deploy_preview(&session_id).await {
            Ok(result) => {
                {
                    let mut state = self.0.state.lock().unwrap();
                    state.latest_preview_url = Some(result.preview_url.clone());
                }
                self.persist().await;
                self.broadcast(Event::DeploymentCompleted {
                    preview_url: result.preview_url.clone(),
                    tunnel_url: result.tunnel_url.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                self.broadcast(Event::Error { error: e.to_string() });
                Err(e)
            }
        }
    }

    /// Spawns the phase-loop generation task if one is not already
    /// running. Safe to call repeatedly — `generate_all`/`resume_generation`
    /// are idempotent.
    fn kick_generation(&self) {
        let mut task_slot = self.0.generation_task.lock().unwrap();
        if let Some(existing) = task_slot.as_ref() {
            if !existing.is_finished() {
                return;
            }
        }
        self.0.running.store(true, Ordering::SeqCst);
        let agent = self.clone();
        *task_slot = Some(tokio::spawn(async move { agent.run_generation().await }));
    }

    /// Drives the implement/validate/fix phase loop one phase at a time
    /// until the blueprint is exhausted, a fatal error occurs, or
    /// `stop_generation` is observed.
    async fn run_generation(&self) {
        loop {
            if !self.0.running.load(Ordering::SeqCst) {
                self.transition(DevState::Paused).await;
                self.broadcast(Event::GenerationStopped);
                return;
            }

            let next_phase = {
                let state = self.0.state.lock().unwrap();
                let blueprint = match &state.blueprint {
                    Some(b) => b,
                    None => return,
                };
                let completed_names: std::collections::HashSet<&str> = state
                    .generated_phases
                    .iter()
                    .filter(|p| p.completed)
                    .map(|p| p.name.as_str())
                    .collect();
                blueprint.phases.iter().find(|p| !completed_names.contains(p.name.as_str())).cloned()
            };

            let Some(phase) = next_phase else {
                self.transition(DevState::Terminal).await;
                self.broadcast(Event::GenerationComplete);
                self.append_internal_memo("generation complete: all phases implemented");
                return;
            };

            let drained = {
                let mut state = self.0.state.lock().unwrap();
                std::mem::take(&mut state.pending_user_inputs)
            };

            self.transition(DevState::Implementing).await;
            self.broadcast(Event::PhaseImplementing {
                message: format!("implementing {}", phase.name),
                phase_name: phase.name.clone(),
            });

            let (session_id, mut files, client_errors) = {
                let state = self.0.state.lock().unwrap();
                (
                    state.sandbox_session_id.clone().unwrap_or_default(),
                    state.generated_files_map.clone(),
                    state.client_reported_errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>(),
                )
            };

            match self.run_phase_with_retry(&session_id, &phase, &mut files, &drained, &client_errors).await {
                Ok(result) => {
                    self.transition(DevState::Validating).await;
                    self.apply_phase_result(files, result.generated_phase.clone());
                    self.persist().await;
                    if result.issues_found {
                        self.transition(DevState::Fixing).await;
                        self.append_internal_memo(format!(
                            "phase {} surfaced unresolved issues after the fix loop",
                            phase.name
                        ));
                    }
                }
                Err(e) => {
                    error!(agent_id = %self.0.id, phase = %phase.name, error = %e, "phase execution failed");
                    self.broadcast(Event::Error { error: e.to_string() });
                    return;
                }
            }
        }
    }

    /// Sandbox calls get up to `max_sandbox_retries` attempts with
    /// exponential backoff; everything else from the phase executor is
    /// surfaced immediately.
    async fn run_phase_with_retry(
        &self,
        session_id: &str,
        phase: &appforge_protocol::Phase,
        files: &mut BTreeMap<String, appforge_protocol::GeneratedFile>,
        drained: &[String],
        client_errors: &[String],
    ) -> Result<crate::phase_executor::PhaseExecutionResult> {
        let sink = BroadcastSink(self.clone());
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            match self
                .0
                .phase_executor
                .run_phase(session_id, phase, files, drained, client_errors, &sink)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) if e.is_locally_recoverable() && attempt < self.0.config.limits.max_sandbox_retries as u64 => {
                    warn!(agent_id = %self.0.id, attempt, error = %e, "retrying phase after transient error");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn apply_phase_result(
        &self,
        files: BTreeMap<String, appforge_protocol::GeneratedFile>,
        generated_phase: GeneratedPhase,
    ) {
        let mut state = self.0.state.lock().unwrap();
        state.generated_files_map = files;
        match state.generated_phases.iter_mut().find(|p| p.name == generated_phase.name) {
            Some(existing) => *existing = generated_phase,
            None => state.generated_phases.push(generated_phase),
        }
    }

    async fn transition(&self, to: DevState) {
        let from = {
            let mut state = self.0.state.lock().unwrap();
            let from = state.current_dev_state;
            state.current_dev_state = to;
            from
        };
        debug!(agent_id = %self.0.id, ?from, ?to, "state transition");
        self.persist().await;
    }

    async fn persist(&self) {
        let snapshot = self.get_full_state();
        if let Err(e) = self.0.store.save(&self.0.id, &snapshot).await {
            error!(agent_id = %self.0.id, error = %e, "failed to persist agent state");
        }
    }

    fn append_internal_memo(&self, description: impl Into<String>) {
        let mut state = self.0.state.lock().unwrap();
        let memo = internal_memo(format!("memo-{}", state.conversation_messages.len()), description);
        state.conversation_messages.push(memo);
    }

    /// Broadcasts an event to every subscriber. A subscriber whose buffer
    /// is full has non-essential events dropped for it rather than
    /// blocking the broadcaster; essential events are delivered via a
    /// detached send so one slow subscriber cannot stall the others.
    fn broadcast(&self, event: Event) {
        let subscribers = self.0.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(pending)) => {
                    if is_essential(&pending) {
                        let sender = subscriber.sender.clone();
                        tokio::spawn(async move {
                            let _ = sender.send(pending).await;
                        });
                    } else {
                        warn!(subscriber_id = subscriber.id, "dropping backpressured non-essential event");
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

struct BroadcastSink(SessionAgent);

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        self.0.broadcast(event);
    }
}

fn fresh_state() -> AgentStateSnapshot {
    AgentStateSnapshot {
        query: String::new(),
        blueprint: None,
        template_details: None,
        generated_files_map: BTreeMap::new(),
        generated_phases: Vec::new(),
        conversation_messages: Vec::new(),
        pending_user_inputs: Vec::new(),
        should_be_generating: false,
        current_dev_state: DevState::Idle,
        sandbox_session_id: None,
        client_reported_errors: Vec::new(),
        latest_preview_url: None,
    }
}

/// Cheap non-cryptographic stand-in for the `stackHash` field a browser
/// client is expected to have already computed; the core only needs it to
/// be stable per distinct stack, not collision-resistant.
fn stack_hash(stack: &str) -> String {
    use std::hash::Hash;
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    stack.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use serde_json::Value;

    use crate::inference::ChatTurn;
    use crate::inference::ChatWithToolsRequest;
    use crate::inference::ChunkSink;
    use crate::sandbox::CommandOutput;
    use crate::sandbox::StaticAnalysisResult;
    use crate::persistence::InMemoryStateStore;

    use super::*;

    struct StubSandbox {
        bootstrap_calls: AtomicUsize,
    }

    #[async_trait]
    impl SandboxClient for StubSandbox {
        async fn bootstrap(&self, _template_name: &str) -> Result<String> {
            self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
            Ok("session-1".to_string())
        }

        async fn write_file(&self, _session_id: &str, _path: &str, _contents: &str) -> Result<()> {
            Ok(())
        }

        async fn read_file(&self, _session_id: &str, _path: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn run_command(&self, _session_id: &str, _command: &str) -> Result<CommandOutput> {
            Ok(CommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() })
        }

        async fn static_analysis(&self, _session_id: &str) -> Result<StaticAnalysisResult> {
            Ok(StaticAnalysisResult::default())
        }

        async fn deploy_preview(&self, _session_id: &str) -> Result<DeployResult> {
            Ok(DeployResult { preview_url: "https://preview.example/app".to_string(), tunnel_url: None })
        }
    }

    struct StubInference;

    #[async_trait]
    impl InferenceClient for StubInference {
        async fn structured_output(
            &self,
            request: StructuredOutputRequest,
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<Value> {
            if request.schema_name == "blueprint" {
                return Ok(json!({
                    "title": "Todo App",
                    "description": "a todo app",
                    "frameworks": ["react"],
                    "phases": [
                        {
                            "name": "scaffold",
                            "description": "initial scaffold",
                            "files": [{ "path": "src/App.tsx", "purpose": "entry point" }]
                        }
                    ]
                }));
            }
            Ok(json!({ "src/App.tsx": "export default function App() { return null; }" }))
        }

        async fn chat_with_tools(
            &self,
            _request: ChatWithToolsRequest,
            _available_tools: &[String],
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<ChatTurn> {
            Ok(ChatTurn { text: "ok".to_string(), tool_calls: vec![] })
        }
    }

    fn new_test_agent() -> SessionAgent {
        SessionAgent::new(
            AgentId::new("agent-test"),
            AgentConfig::default(),
            Arc::new(StubSandbox { bootstrap_calls: AtomicUsize::new(0) }),
            Arc::new(StubInference),
            Arc::new(InMemoryStateStore::new()),
        )
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let agent = new_test_agent();
        let request = InitializeRequest {
            query: "build me a todo app".to_string(),
            template_name: "react-vite".to_string(),
            agent_mode: AgentMode::Smart,
        };
        let first = agent.initialize(request).await.unwrap();
        let second = agent
            .initialize(InitializeRequest {
                query: "a different query".to_string(),
                template_name: "react-vite".to_string(),
                agent_mode: AgentMode::Smart,
            })
            .await
            .unwrap();
        assert_eq!(first.query, second.query, "second initialize should be a no-op");
    }

    #[tokio::test]
    async fn generation_runs_to_completion_and_marks_phase_complete() {
        let agent = new_test_agent();
        agent
            .initialize(InitializeRequest {
                query: "build me a todo app".to_string(),
                template_name: "react-vite".to_string(),
                agent_mode: AgentMode::Smart,
            })
            .await
            .unwrap();

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let state = agent.get_full_state();
            if state.current_dev_state == DevState::Terminal {
                break;
            }
        }

        let state = agent.get_full_state();
        assert_eq!(state.current_dev_state, DevState::Terminal);
        assert_eq!(state.generated_phases.len(), 1);
        assert!(state.generated_phases[0].completed);
        assert!(state.generated_files_map.contains_key("src/App.tsx"));
    }

    #[tokio::test]
    async fn subscribe_receives_initial_snapshot() {
        let agent = new_test_agent();
        let (_id, mut rx) = agent.subscribe();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::CfAgentState { .. }));
    }

    #[tokio::test]
    async fn set_state_rejects_non_idle_target() {
        let agent = new_test_agent();
        let mut state = fresh_state();
        state.current_dev_state = DevState::Implementing;
        let result = agent.set_state(state);
        assert!(matches!(result, Err(AgentError::SetStateRequiresIdle(DevState::Implementing))));
    }
}
