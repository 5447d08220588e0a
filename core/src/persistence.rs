//! Durable-state abstraction keeping agent state alive across process
//! restarts without depending on any specific external KV product. Adapted
//! from an append-only rollout log pattern into a per-agent latest-snapshot
//! store, since `setState`/clone operations need random read/write rather
//! than replay.

// Poisoned lock should fail the program.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use appforge_protocol::AgentId;
use appforge_protocol::AgentStateSnapshot;

use crate::error::Result;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentStateSnapshot>>;
    async fn save(&self, agent_id: &AgentId, state: &AgentStateSnapshot) -> Result<()>;
    async fn delete(&self, agent_id: &AgentId) -> Result<()>;
}

/// Reference implementation backing a single process. Production
/// deployments would swap this for a real per-agent KV namespace; the core
/// neither knows nor cares which.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<AgentId, AgentStateSnapshot>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentStateSnapshot>> {
        let states = self.states.read().unwrap();
        Ok(states.get(agent_id).cloned())
    }

    async fn save(&self, agent_id: &AgentId, state: &AgentStateSnapshot) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.insert(agent_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, agent_id: &AgentId) -> Result<()> {
        let mut states = self.states.write().unwrap();
        states.remove(agent_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use appforge_protocol::DevState;

    use super::*;

    fn sample_state() -> AgentStateSnapshot {
        AgentStateSnapshot {
            query: "build me a todo app".to_string(),
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

    #[tokio::test]
    async fn round_trips_a_saved_state() {
        let store = InMemoryStateStore::new();
        let agent_id = AgentId::new("agent-1");
        assert!(store.load(&agent_id).await.unwrap().is_none());

        store.save(&agent_id, &sample_state()).await.unwrap();
        let loaded = store.load(&agent_id).await.unwrap().expect("state was saved");
        assert_eq!(loaded.query, "build me a todo app");

        store.delete(&agent_id).await.unwrap();
        assert!(store.load(&agent_id).await.unwrap().is_none());
    }
}
