use thiserror::Error;

/// Result type alias for root operations.
pub type RootResult<T> = Result<T, RootError>;

#[derive(Debug, Error)]
pub enum RootError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("authentication error: {0}")]
    Auth(#[from] warden_auth::AuthError),

    #[error("policy error: {0}")]
    Policy(#[from] warden_policy::PolicyError),

    #[error("agent error: {0}")]
    Agent(#[from] warden_agent::AgentError),

    #[error("router error: {0}")]
    Router(#[from] warden_router::RouterError),

    #[error("internal error: {0}")]
    Internal(String),
}
