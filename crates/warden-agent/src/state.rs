//! Conversation state and the agent state machine.
//!
//! States: `Route -> {UseTools, Respond} -> End`. The orchestrator commits
//! one [`ConversationState`] snapshot per completed transition; resumption
//! after interruption restarts at the last committed state, never
//! mid-transition.

use serde::{Deserialize, Serialize};

use warden_core::{RequestId, SubjectId};
use warden_router::ChatMessage;

// ---------------------------------------------------------------------------
// AgentState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Route,
    UseTools,
    Respond,
    End,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::End)
    }
}

// ---------------------------------------------------------------------------
// ToolInvocation
// ---------------------------------------------------------------------------

/// One requested action: the target object (`tool:chat`) plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub action: String,
    pub arguments: serde_json::Value,
}

// ---------------------------------------------------------------------------
// ConversationState
// ---------------------------------------------------------------------------

/// Checkpointed state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub next_action: AgentState,
    /// Actions awaiting dispatch when `next_action` is `UseTools`.
    pub pending_actions: Vec<ToolInvocation>,
    pub user_id: SubjectId,
    pub request_id: RequestId,
}

impl ConversationState {
    pub fn new(user_id: SubjectId, request_id: RequestId) -> Self {
        Self {
            messages: Vec::new(),
            next_action: AgentState::Route,
            pending_actions: Vec::new(),
            user_id,
            request_id,
        }
    }
}
