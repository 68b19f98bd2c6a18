//! Credential verification.
//!
//! Verification flow:
//! 1. Parse the credential (structure check).
//! 2. Verify the Ed25519 signature over the exact claims bytes.
//! 3. Check expiry against the leeway constant.
//!
//! Each step fails terminally; there is no retry path. The only side
//! effect is one observability event on failure.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::sync::Arc;

use warden_core::{EventKind, EventSink, ObservedEvent, Principal, SubjectId, Timestamp};

use crate::error::{AuthError, AuthResult};
use crate::token::parse_token;

/// Clock-skew leeway in seconds.
///
/// A token is treated as expired once its expiry is within this many
/// seconds of the current time. The conservative direction means a skewed
/// issuer clock can never extend a token's life: `exp <= now + leeway`
/// always fails, so `exp = now` and any past expiry are rejected.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 5;

/// Verifies bearer credentials and produces a [`Principal`].
///
/// Holds only public verification material. Issuance lives elsewhere
/// (see [`crate::issuer::TestIssuer`] for the non-production path).
pub struct AuthenticationGuard {
    verifying_key: VerifyingKey,
    sink: Arc<dyn EventSink>,
}

impl AuthenticationGuard {
    pub fn new(verifying_key: VerifyingKey, sink: Arc<dyn EventSink>) -> Self {
        Self {
            verifying_key,
            sink,
        }
    }

    /// Construct from raw 32-byte public key material.
    pub fn from_public_key_bytes(bytes: &[u8], sink: Arc<dyn EventSink>) -> AuthResult<Self> {
        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| AuthError::InvalidSignature)?;
        let verifying_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| AuthError::InvalidSignature)?;
        Ok(Self::new(verifying_key, sink))
    }

    /// Verify a bearer credential and produce the request's [`Principal`].
    ///
    /// Non-blocking and side-effect free except for one audit event on
    /// failure. Failures are terminal: `MalformedToken`, `InvalidSignature`,
    /// or `ExpiredToken`.
    pub fn verify(&self, credential: &str) -> AuthResult<Principal> {
        self.verify_at(credential, Timestamp::now())
    }

    /// Verification against an explicit clock, used by tests to pin "now".
    pub fn verify_at(&self, credential: &str, now: Timestamp) -> AuthResult<Principal> {
        let result = self.verify_inner(credential, now);
        if let Err(ref err) = result {
            self.sink.emit(ObservedEvent::new(
                EventKind::AuthenticationFailed,
                None,
                err.code(),
            ));
        }
        result
    }

    fn verify_inner(&self, credential: &str, now: Timestamp) -> AuthResult<Principal> {
        let token = parse_token(credential)?;

        let signature = Signature::from_bytes(&token.signature);
        self.verifying_key
            .verify(&token.claims_bytes, &signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        // A token issued in the future beyond the leeway cannot be genuine.
        if token.claims.iat > now.seconds_since_epoch + CLOCK_SKEW_LEEWAY_SECS {
            return Err(AuthError::InvalidSignature);
        }

        if token.claims.exp <= now.seconds_since_epoch + CLOCK_SKEW_LEEWAY_SECS {
            tracing::debug!(
                sub = %token.claims.sub,
                exp = token.claims.exp,
                now = now.seconds_since_epoch,
                "credential expired"
            );
            return Err(AuthError::ExpiredToken);
        }

        Ok(Principal {
            subject_id: SubjectId::new(token.claims.sub),
            roles: token.claims.roles,
            token_expiry: Timestamp::from_seconds(token.claims.exp),
        })
    }
}
