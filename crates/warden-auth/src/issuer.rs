//! Non-production credential issuance.
//!
//! The gateway only ever verifies credentials; issuance belongs to the
//! external credential issuer. `TestIssuer` exists for tests and for the
//! binary's explicitly flagged dev-issuer mode. It must never be wired
//! into a production composition root.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use warden_core::Timestamp;

use crate::token::{encode_token, Claims};

/// Ed25519 credential issuer for tests and dev mode only.
pub struct TestIssuer {
    signing_key: SigningKey,
}

impl TestIssuer {
    /// Generate a fresh issuer keypair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Construct from existing key material (dev-issuer config).
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// The public verification key matching this issuer.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Issue a credential for `sub` valid for `ttl_secs` from now.
    pub fn issue(&self, sub: &str, roles: &[&str], ttl_secs: u64) -> String {
        let now = Timestamp::now().seconds_since_epoch;
        self.issue_at(sub, roles, now, now + ttl_secs)
    }

    /// Issue a credential with an explicit expiry timestamp.
    pub fn issue_with_expiry(&self, sub: &str, roles: &[&str], exp: u64) -> String {
        let now = Timestamp::now().seconds_since_epoch;
        self.issue_at(sub, roles, now, exp)
    }

    /// Issue a credential with explicit issued-at and expiry timestamps.
    pub fn issue_at(&self, sub: &str, roles: &[&str], iat: u64, exp: u64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            iat,
            exp,
        };
        let claims_bytes =
            serde_json::to_vec(&claims).expect("claims serialization should not fail");
        let signature = self.signing_key.sign(&claims_bytes).to_bytes();
        encode_token(&claims_bytes, &signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_token;

    #[test]
    fn test_issue_produces_parseable_token() {
        let issuer = TestIssuer::generate();
        let credential = issuer.issue("alice", &["operator", "reader"], 60);
        let token = parse_token(&credential).unwrap();
        assert_eq!(token.claims.sub, "alice");
        assert_eq!(token.claims.roles, vec!["operator", "reader"]);
        assert!(token.claims.exp > token.claims.iat);
    }

    #[test]
    fn test_distinct_issuers_have_distinct_keys() {
        let a = TestIssuer::generate();
        let b = TestIssuer::generate();
        assert_ne!(a.verifying_key_bytes(), b.verifying_key_bytes());
    }

    #[test]
    fn test_from_signing_key_bytes_deterministic() {
        let seed = [7u8; 32];
        let a = TestIssuer::from_signing_key_bytes(&seed);
        let b = TestIssuer::from_signing_key_bytes(&seed);
        assert_eq!(a.verifying_key_bytes(), b.verifying_key_bytes());
    }
}
