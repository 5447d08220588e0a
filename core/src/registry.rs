//! The agent registry: locates or creates the single live [`SessionAgent`]
//! for a given [`AgentId`], and implements `clone` for the fork/clone
//! flow.
//!
//! A `RwLock<HashMap<Id, Arc<...>>>` guards lazily-spawned instances,
//! read-locked on the hot lookup path and write-locked only to insert a
//! newly created agent. Sharding agents
//! across multiple processes is an external deployment concern; this
//! registry models the single-shard case and exposes an [`AgentLocator`]
//! seam for an integration layer to extend into multi-shard probing
//! without changing this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use appforge_protocol::AgentId;
use appforge_protocol::ClientReportedError;
use appforge_protocol::DevState;

use crate::agent::SessionAgent;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::error::Result;
use crate::inference::InferenceClient;
use crate::persistence::StateStore;
use crate::sandbox::SandboxClient;
use tokio::sync::RwLock;

/// Seam for resolving an [`AgentId`] to a live agent across shards. The
/// single-process registry below is itself an `AgentLocator`; a
/// multi-shard deployment would implement this trait by probing peers
/// and falling back to [`AgentRegistry::get`] locally.
#[async_trait]
pub trait AgentLocator: Send + Sync {
    async fn locate(&self, agent_id: &AgentId) -> Option<SessionAgent>;
}

/// Collaborators a freshly created [`SessionAgent`] needs. Held once by
/// the registry and handed to every agent it creates.
pub struct AgentFactory {
    pub sandbox: Arc<dyn SandboxClient>,
    pub inference: Arc<dyn InferenceClient>,
    pub config: AgentConfig,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<AgentId, SessionAgent>>,
    store: Arc<dyn StateStore>,
    factory: AgentFactory,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn StateStore>, factory: AgentFactory) -> Self {
        Self { agents: RwLock::new(HashMap::new()), store, factory }
    }

    /// Returns the authoritative live instance for `agent_id`, creating it
    /// (and restoring any persisted state) if this is the first lookup
    /// since process start. Guarantees at-most-one live writer per
    /// `AgentId`: concurrent callers racing on a cold id serialize on the
    /// write lock and only one constructs the agent.
    pub async fn get_or_create(&self, agent_id: &AgentId) -> Result<SessionAgent> {
        if let Some(agent) = self.agents.read().await.get(agent_id) {
            return Ok(agent.clone());
        }

        let mut agents = self.agents.write().await;
        if let Some(agent) = agents.get(agent_id) {
            return Ok(agent.clone());
        }

        let agent = match self.store.load(agent_id).await? {
            Some(snapshot) => {
                info!(%agent_id, "restoring agent from persisted state");
                SessionAgent::restore(
                    agent_id.clone(),
                    self.factory.config.clone(),
                    self.factory.sandbox.clone(),
                    self.factory.inference.clone(),
                    self.store.clone(),
                    snapshot,
                )
            }
            None => SessionAgent::new(
                agent_id.clone(),
                self.factory.config.clone(),
                self.factory.sandbox.clone(),
                self.factory.inference.clone(),
                self.store.clone(),
            ),
        };
        agents.insert(agent_id.clone(), agent.clone());
        Ok(agent)
    }

    /// Returns the live instance only if one already exists in this
    /// process (no restore-from-store, no creation). Used by callers that
    /// must distinguish "never initialized" from "exists".
    pub async fn get(&self, agent_id: &AgentId) -> Option<SessionAgent> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// Deep-copies `source_agent_id`'s state into a freshly minted id,
    /// except the transient fields that don't make sense to carry over:
    /// the sandbox session (a fresh agent bootstraps its own),
    /// `shouldBeGenerating` (false, so the clone does not immediately
    /// start generating), and `clientReportedErrors` (reset to empty).
    /// `currentDevState` is reset to `Idle` so the clone is immediately
    /// eligible for `setState`.
    pub async fn clone_agent(&self, source_agent_id: &AgentId) -> Result<AgentId> {
        let source = self
            .agents
            .read()
            .await
            .get(source_agent_id)
            .cloned()
            .ok_or_else(|| AgentError::AgentNotFound(source_agent_id.clone()))?;

        let mut cloned_state = source.get_full_state();
        cloned_state.sandbox_session_id = None;
        cloned_state.should_be_generating = false;
        cloned_state.current_dev_state = DevState::Idle;
        cloned_state.client_reported_errors = Vec::<ClientReportedError>::new();

        let new_id = AgentId::new(Uuid::new_v4().to_string());
        let new_agent = SessionAgent::new(
            new_id.clone(),
            self.factory.config.clone(),
            self.factory.sandbox.clone(),
            self.factory.inference.clone(),
            self.store.clone(),
        );
        new_agent.set_state(cloned_state)?;
        self.store.save(&new_id, &new_agent.get_full_state()).await?;

        self.agents.write().await.insert(new_id.clone(), new_agent);
        Ok(new_id)
    }

    /// Number of agents live in this process, for diagnostics/tests.
    pub async fn live_count(&self) -> usize {
        self.agents.read().await.len()
    }
}

#[async_trait]
impl AgentLocator for AgentRegistry {
    async fn locate(&self, agent_id: &AgentId) -> Option<SessionAgent> {
        self.get(agent_id).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use serde_json::Value;

    use crate::inference::ChatTurn;
    use crate::inference::ChatWithToolsRequest;
    use crate::inference::ChunkSink;
    use crate::persistence::InMemoryStateStore;
    use crate::sandbox::CommandOutput;
    use crate::sandbox::DeployResult;
    use crate::sandbox::StaticAnalysisResult;

    use super::*;

    struct StubSandbox;

    #[async_trait]
    impl SandboxClient for StubSandbox {
        async fn bootstrap(&self, _template_name: &str) -> Result<String> {
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
            _request: crate::inference::StructuredOutputRequest,
            _on_chunk: Option<ChunkSink<'_>>,
        ) -> Result<Value> {
            Ok(json!({ "title": "t", "description": "d", "frameworks": [], "phases": [] }))
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

    fn registry() -> AgentRegistry {
        AgentRegistry::new(
            Arc::new(InMemoryStateStore::new()),
            AgentFactory {
                sandbox: Arc::new(StubSandbox),
                inference: Arc::new(StubInference),
                config: AgentConfig::default(),
            },
        )
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_instance() {
        let registry = registry();
        let id = AgentId::new("chat-1");
        let first = registry.get_or_create(&id).await.unwrap();
        let second = registry.get_or_create(&id).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(registry.live_count().await, 1);
    }

    #[tokio::test]
    async fn clone_isolates_file_maps() {
        let registry = registry();
        let source_id = AgentId::new("chat-source");
        let source = registry.get_or_create(&source_id).await.unwrap();
        source
            .initialize(crate::agent::InitializeRequest {
                query: "q".to_string(),
                template_name: "react-vite".to_string(),
                agent_mode: crate::agent::AgentMode::Smart,
            })
            .await
            .unwrap();

        let clone_id = registry.clone_agent(&source_id).await.unwrap();
        let clone = registry.get(&clone_id).await.unwrap();

        assert_eq!(clone.get_full_state().query, source.get_full_state().query);
        assert_eq!(clone.get_full_state().current_dev_state, DevState::Idle);
        assert!(!clone.get_full_state().should_be_generating);
        assert_ne!(clone.id(), source.id());
    }

    #[tokio::test]
    async fn clone_of_unknown_agent_errors() {
        let registry = registry();
        let result = registry.clone_agent(&AgentId::new("missing")).await;
        assert!(matches!(result, Err(AgentError::AgentNotFound(_))));
    }
}
