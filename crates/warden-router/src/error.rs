use thiserror::Error;

use warden_core::ProfileName;

use crate::router::InvocationAttempt;

/// Result type alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

// ---------------------------------------------------------------------------
// ProviderFailure — the categorized error a provider call can produce
// ---------------------------------------------------------------------------

/// Categorized failure from one provider call, as reported by the
/// provider collaborator or derived from the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProviderFailure {
    #[error("rate limited")]
    RateLimit,

    #[error("provider server error (status {status})")]
    ServerError { status: u16 },

    #[error("provider call timed out")]
    Timeout,

    #[error("provider rejected credentials")]
    Auth,

    #[error("provider rejected the request as malformed")]
    BadRequest,
}

/// Whether a failure should drive fallback or abort the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Capacity or availability problem: try the next profile.
    Transient,
    /// Caller or configuration defect: falling back would mask the real
    /// error. Abort the whole chain.
    Permanent,
}

impl ProviderFailure {
    /// Default transient/permanent classification. Adapters may override
    /// per dialect, but the boundary is always the same idea: capacity
    /// problems fall back, defects abort.
    pub fn default_class(&self) -> ErrorClass {
        match self {
            ProviderFailure::RateLimit
            | ProviderFailure::ServerError { .. }
            | ProviderFailure::Timeout => ErrorClass::Transient,
            ProviderFailure::Auth | ProviderFailure::BadRequest => ErrorClass::Permanent,
        }
    }
}

// ---------------------------------------------------------------------------
// RouterError
// ---------------------------------------------------------------------------

/// Router failures surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("no provider profiles configured")]
    NoProfiles,

    #[error("invalid provider profile: {0}")]
    InvalidProfile(String),

    #[error("unknown provider dialect '{0}'")]
    UnknownDialect(String),

    #[error("provider '{provider}' failed permanently: {failure}")]
    Permanent {
        provider: ProfileName,
        failure: ProviderFailure,
        attempts: Vec<InvocationAttempt>,
    },

    #[error("all providers exhausted after {} attempts", attempts.len())]
    AllProvidersExhausted { attempts: Vec<InvocationAttempt> },

    #[error("provider response malformed: {0}")]
    MalformedResponse(String),
}

impl RouterError {
    /// Stable machine-readable code for transport-level error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::InvalidMessage(_) => "router/invalid_message",
            RouterError::NoProfiles => "router/no_profiles",
            RouterError::InvalidProfile(_) => "router/invalid_profile",
            RouterError::UnknownDialect(_) => "router/unknown_dialect",
            RouterError::Permanent { .. } => "router/permanent_failure",
            RouterError::AllProvidersExhausted { .. } => "router/providers_exhausted",
            RouterError::MalformedResponse(_) => "router/malformed_response",
        }
    }
}
