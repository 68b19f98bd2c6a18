//! Conversation checkpointing.
//!
//! One read/write contract keyed by conversation identifier. The bundled
//! in-memory store serves tests and volatile deployments; a durable store
//! implements the same trait. `commit` is all-or-nothing — a cancelled
//! request never leaves a half-written snapshot.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use warden_core::ConversationId;

use crate::error::{AgentError, AgentResult};
use crate::state::ConversationState;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last committed snapshot for a conversation.
    async fn load(&self, id: &ConversationId) -> AgentResult<Option<ConversationState>>;

    /// Atomically replace the conversation's snapshot.
    async fn commit(&self, id: &ConversationId, state: &ConversationState) -> AgentResult<()>;
}

/// Volatile checkpoint store.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: Mutex<HashMap<ConversationId, ConversationState>>,
    commits: Mutex<u64>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits observed. Used by tests to assert one commit per
    /// completed transition.
    pub fn commit_count(&self) -> u64 {
        self.commits.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, id: &ConversationId) -> AgentResult<Option<ConversationState>> {
        let states = self
            .states
            .lock()
            .map_err(|_| AgentError::Checkpoint("checkpoint lock poisoned".into()))?;
        Ok(states.get(id).cloned())
    }

    async fn commit(&self, id: &ConversationId, state: &ConversationState) -> AgentResult<()> {
        let mut states = self
            .states
            .lock()
            .map_err(|_| AgentError::Checkpoint("checkpoint lock poisoned".into()))?;
        states.insert(id.clone(), state.clone());
        drop(states);
        if let Ok(mut commits) = self.commits.lock() {
            *commits += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentState;
    use warden_core::{RequestId, SubjectId};

    fn make_state(request: &str) -> ConversationState {
        ConversationState::new(SubjectId::new("alice"), RequestId::new(request))
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store
            .load(&ConversationId::new("conv-1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_commit_then_load() {
        let store = InMemoryCheckpointStore::new();
        let id = ConversationId::new("conv-1");
        let state = make_state("req-1");
        store.commit(&id, &state).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(state));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_commit_replaces_wholesale() {
        let store = InMemoryCheckpointStore::new();
        let id = ConversationId::new("conv-1");
        store.commit(&id, &make_state("req-1")).await.unwrap();

        let mut updated = make_state("req-2");
        updated.next_action = AgentState::End;
        store.commit(&id, &updated).await.unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.request_id.as_str(), "req-2");
        assert_eq!(loaded.next_action, AgentState::End);
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        store
            .commit(&ConversationId::new("a"), &make_state("req-a"))
            .await
            .unwrap();
        assert!(store
            .load(&ConversationId::new("b"))
            .await
            .unwrap()
            .is_none());
    }
}
