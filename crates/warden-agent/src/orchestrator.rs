//! The orchestrator: route, act, respond.
//!
//! Per request: decide the next action from the latest message, authorize
//! every requested action before any dispatch, delegate generation to the
//! provider router, and commit a conversation checkpoint after each
//! completed transition. Transitions of a single conversation are
//! serialized: at most one is in flight per conversation identifier.
//!
//! Fail-secure ordering is the point of this module — an authorization
//! denial (or a timed-out check, after one bounded retry) must prevent the
//! dispatch entirely. No provider call, no tool call, no spend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use warden_core::{
    ConversationId, EventKind, EventSink, ObservedEvent, Principal, RequestId, TracingEventSink,
};
use warden_policy::{AuthorizationEngine, ObjectRef, PolicyError, RelationName, UserRef};
use warden_router::{ChatMessage, GenerationRequest, ProviderRouter, Role, SharedProfiles};

use crate::audit::{AuditDecision, AuditEntry, AuditLog};
use crate::checkpoint::CheckpointStore;
use crate::error::{AgentError, AgentResult};
use crate::state::{AgentState, ConversationState, ToolInvocation};
use crate::tools::ToolExecutor;

/// The relation every action dispatch is authorized against.
pub const EXECUTOR_RELATION: &str = "executor";

// ---------------------------------------------------------------------------
// Transport-facing request/result
// ---------------------------------------------------------------------------

/// Structured request delivered by the transport adapter. The credential
/// has already been consumed by the authentication guard; the orchestrator
/// receives the resulting [`Principal`] alongside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub request_id: RequestId,
    pub conversation_id: ConversationId,
    /// Explicit tool invocations, if the caller requested any.
    #[serde(default)]
    pub actions: Vec<ToolInvocation>,
    /// The caller's message, appended to the conversation.
    pub message: ChatMessage,
    #[serde(default)]
    pub generation: GenerationRequest,
}

/// Result returned to the transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub request_id: RequestId,
    pub content: String,
    /// Tool outputs, one per dispatched action, in request order.
    #[serde(default)]
    pub tool_outputs: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Composes the authorization engine, provider router, tool executor, and
/// checkpoint store. All collaborators are injected; the composition root
/// owns their lifecycle.
pub struct Orchestrator {
    engine: Arc<AuthorizationEngine>,
    router: Arc<ProviderRouter>,
    profiles: Arc<SharedProfiles>,
    tools: Arc<dyn ToolExecutor>,
    checkpoints: Arc<dyn CheckpointStore>,
    sink: Arc<dyn EventSink>,
    audit: Arc<AuditLog>,
    locks: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<AuthorizationEngine>,
        router: Arc<ProviderRouter>,
        profiles: Arc<SharedProfiles>,
        tools: Arc<dyn ToolExecutor>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            engine,
            router,
            profiles,
            tools,
            checkpoints,
            sink: Arc::new(TracingEventSink),
            audit: Arc::new(AuditLog::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The hash-chained audit log of handled invocations.
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Handle one authenticated request through the state machine.
    pub async fn handle(
        &self,
        principal: &Principal,
        request: ToolCallRequest,
    ) -> AgentResult<ToolCallResult> {
        let started = std::time::Instant::now();
        request.message.validate().map_err(AgentError::Provider)?;

        // Single-writer discipline: one in-flight transition per
        // conversation. The guard lives for the whole request.
        let lock = self.conversation_lock(&request.conversation_id);
        let _guard = lock.lock().await;

        let mut state = self
            .checkpoints
            .load(&request.conversation_id)
            .await?
            .unwrap_or_else(|| {
                ConversationState::new(principal.subject_id.clone(), request.request_id.clone())
            });
        state.request_id = request.request_id.clone();
        state.messages.push(request.message.clone());

        // ROUTE: explicit invocations go to the tool path; anything
        // ambiguous defaults to a plain response.
        let next = self.route(&request);
        state.next_action = next;
        state.pending_actions = match next {
            AgentState::UseTools => request.actions.clone(),
            _ => Vec::new(),
        };
        self.commit(&request.conversation_id, &state).await?;

        let result = match next {
            AgentState::UseTools => self.use_tools(principal, &request, &mut state).await,
            AgentState::Respond => self.respond(&request, &mut state).await,
            AgentState::Route | AgentState::End => Err(AgentError::InvalidRequest(format!(
                "route produced non-actionable state {next:?}"
            ))),
        };

        let detail = if request.actions.is_empty() {
            "respond".to_string()
        } else {
            request
                .actions
                .iter()
                .map(|a| a.action.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        let entry = AuditEntry {
            entry_id: uuid::Uuid::new_v4().to_string(),
            request_id: request.request_id.clone(),
            subject: principal.subject_id.clone(),
            conversation: request.conversation_id.clone(),
            decision: match &result {
                Ok(_) => AuditDecision::Permit,
                Err(AgentError::PermissionDenied { .. }) | Err(AgentError::AuthorizationTimeout) => {
                    AuditDecision::Deny
                }
                Err(_) => AuditDecision::Error,
            },
            detail,
            timestamp: warden_core::Timestamp::now(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match result {
            Ok(result) => {
                state.next_action = AgentState::End;
                state.pending_actions = Vec::new();
                self.commit(&request.conversation_id, &state).await?;
                self.audit.record(entry)?;
                Ok(result)
            }
            // The failed transition is not committed; resumption restarts
            // from the routed snapshot. The denial is still audited.
            Err(err) => {
                let _ = self.audit.record(entry);
                Err(err)
            }
        }
    }

    fn route(&self, request: &ToolCallRequest) -> AgentState {
        if !request.actions.is_empty() {
            AgentState::UseTools
        } else {
            AgentState::Respond
        }
    }

    async fn use_tools(
        &self,
        principal: &Principal,
        request: &ToolCallRequest,
        state: &mut ConversationState,
    ) -> AgentResult<ToolCallResult> {
        let relation = RelationName::new(EXECUTOR_RELATION).map_err(AgentError::from)?;
        let user = UserRef::subject(principal.subject_id.as_str());

        // Authorize everything before dispatching anything.
        for invocation in &request.actions {
            let object = ObjectRef::parse(&invocation.action)
                .map_err(|_| AgentError::InvalidRequest(format!(
                    "action must be 'type:id', got '{}'",
                    invocation.action
                )))?;
            let allowed = self
                .check_with_retry(&user, &relation, &object, &request.request_id)
                .await?;
            if !allowed {
                self.sink.emit(ObservedEvent::new(
                    EventKind::AuthorizationDenied,
                    Some(request.request_id.clone()),
                    invocation.action.clone(),
                ));
                tracing::warn!(
                    user = %user,
                    action = %invocation.action,
                    "authorization denied"
                );
                return Err(AgentError::PermissionDenied {
                    action: invocation.action.clone(),
                });
            }
            self.sink.emit(ObservedEvent::new(
                EventKind::AuthorizationGranted,
                Some(request.request_id.clone()),
                invocation.action.clone(),
            ));
        }

        let mut outputs = Vec::with_capacity(request.actions.len());
        for invocation in &request.actions {
            let output = self.tools.execute(invocation).await?;
            state.messages.push(ChatMessage::new(
                Role::Tool,
                output.to_string(),
            ));
            outputs.push(output);
        }

        Ok(ToolCallResult {
            request_id: request.request_id.clone(),
            content: String::new(),
            tool_outputs: outputs,
        })
    }

    async fn respond(
        &self,
        request: &ToolCallRequest,
        state: &mut ConversationState,
    ) -> AgentResult<ToolCallResult> {
        let profiles = self.profiles.load();
        let generation = self
            .router
            .invoke(&state.messages, &request.generation, &profiles)
            .await?;

        state
            .messages
            .push(ChatMessage::assistant(generation.content.clone()));

        Ok(ToolCallResult {
            request_id: request.request_id.clone(),
            content: generation.content,
            tool_outputs: Vec::new(),
        })
    }

    /// One check, retried exactly once on a timed-out budget. A second
    /// timeout surfaces fail-closed; it never becomes an allow.
    async fn check_with_retry(
        &self,
        user: &UserRef,
        relation: &RelationName,
        object: &ObjectRef,
        request_id: &RequestId,
    ) -> AgentResult<bool> {
        match self.engine.check(user, relation, object).await {
            Ok(decision) => Ok(decision),
            Err(PolicyError::Timeout) => {
                tracing::warn!(
                    user = %user,
                    object = %object,
                    "authorization check timed out, retrying once"
                );
                match self.engine.check(user, relation, object).await {
                    Ok(decision) => Ok(decision),
                    Err(PolicyError::Timeout) => {
                        self.sink.emit(ObservedEvent::new(
                            EventKind::AuthorizationTimedOut,
                            Some(request_id.clone()),
                            object.to_string(),
                        ));
                        Err(AgentError::AuthorizationTimeout)
                    }
                    Err(other) => Err(other.into()),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn commit(&self, id: &ConversationId, state: &ConversationState) -> AgentResult<()> {
        self.checkpoints.commit(id, state).await?;
        self.sink.emit(ObservedEvent::new(
            EventKind::CheckpointCommitted,
            Some(state.request_id.clone()),
            format!("{id}:{:?}", state.next_action),
        ));
        Ok(())
    }

    fn conversation_lock(&self, id: &ConversationId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
