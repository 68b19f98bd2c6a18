use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Authorization engine failures.
///
/// `Timeout` is the fail-closed variant: every caller must treat it as a
/// deny decision, never as an allow. `check` maps backend unreachability
/// to `Timeout` for the same reason — an unreachable backend and a slow
/// one are indistinguishable once the budget is charged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("authorization check exceeded its time budget")]
    Timeout,

    #[error("policy backend error: {0}")]
    Backend(String),

    #[error("no authorization model published")]
    NoModel,

    #[error("unknown relation '{relation}' on object type '{object_type}'")]
    UnknownRelation {
        object_type: String,
        relation: String,
    },
}

impl PolicyError {
    /// Stable machine-readable code for transport-level error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::Validation(_) => "policy/validation",
            PolicyError::Conflict(_) => "policy/conflict",
            PolicyError::Timeout => "policy/timeout",
            PolicyError::Backend(_) => "policy/backend",
            PolicyError::NoModel => "policy/no_model",
            PolicyError::UnknownRelation { .. } => "policy/unknown_relation",
        }
    }
}
