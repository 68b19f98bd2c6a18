use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("secret source error: {0}")]
    SecretSource(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
