//! Agent error taxonomy.
//!
//! Every variant carries a stable machine-readable code, and the
//! user-visible rendering is redacted: no stack traces, no raw provider
//! bodies, no credential material. Authentication and authorization
//! failures are never downgraded or retried into a different outcome.

use thiserror::Error;

use warden_auth::AuthError;
use warden_policy::PolicyError;
use warden_router::RouterError;

/// Result type alias for orchestrator operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("permission denied for action '{action}'")]
    PermissionDenied { action: String },

    #[error("authorization check timed out")]
    AuthorizationTimeout,

    #[error("authorization error: {0}")]
    Policy(PolicyError),

    #[error("provider error: {0}")]
    Provider(#[from] RouterError),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<PolicyError> for AgentError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Timeout => AgentError::AuthorizationTimeout,
            other => AgentError::Policy(other),
        }
    }
}

impl AgentError {
    /// Stable code surfaced to the transport adapter.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Auth(err) => err.code(),
            AgentError::PermissionDenied { .. } => "agent/permission_denied",
            AgentError::AuthorizationTimeout => "agent/authorization_timeout",
            AgentError::Policy(err) => err.code(),
            AgentError::Provider(err) => err.code(),
            AgentError::ToolExecution(_) => "agent/tool_execution",
            AgentError::Checkpoint(_) => "agent/checkpoint",
            AgentError::InvalidRequest(_) => "agent/invalid_request",
        }
    }

    /// Redacted, user-visible message. Internal detail stays in logs.
    pub fn public_message(&self) -> String {
        match self {
            AgentError::Auth(err) => err.to_string(),
            AgentError::PermissionDenied { action } => {
                format!("permission denied for action '{action}'")
            }
            AgentError::AuthorizationTimeout => "authorization unavailable, denied".into(),
            AgentError::Policy(_) => "authorization request rejected".into(),
            AgentError::Provider(RouterError::AllProvidersExhausted { attempts }) => {
                format!("generation unavailable after {} attempts", attempts.len())
            }
            AgentError::Provider(_) => "generation backend rejected the request".into(),
            AgentError::ToolExecution(_) => "tool execution failed".into(),
            AgentError::Checkpoint(_) => "conversation state unavailable".into(),
            AgentError::InvalidRequest(detail) => format!("invalid request: {detail}"),
        }
    }
}
