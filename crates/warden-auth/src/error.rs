use thiserror::Error;

/// Result type alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication failures. All variants are terminal for the request:
/// the guard never retries, and the orchestrator never downgrades them.
///
/// Display implementations are uniform and never echo credential material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("expired token")]
    ExpiredToken,
}

impl AuthError {
    /// Stable machine-readable code for transport-level error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "auth/malformed_token",
            AuthError::InvalidSignature => "auth/invalid_signature",
            AuthError::ExpiredToken => "auth/expired_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_never_contains_credential_material() {
        for err in [
            AuthError::MalformedToken,
            AuthError::InvalidSignature,
            AuthError::ExpiredToken,
        ] {
            let msg = err.to_string();
            assert!(!msg.is_empty());
            assert!(!msg.contains("ed25519"));
            assert!(!msg.contains("0x"));
        }
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AuthError::MalformedToken.code(), "auth/malformed_token");
        assert_eq!(AuthError::InvalidSignature.code(), "auth/invalid_signature");
        assert_eq!(AuthError::ExpiredToken.code(), "auth/expired_token");
    }
}
