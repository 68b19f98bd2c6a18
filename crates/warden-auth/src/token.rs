//! Bearer token format: `base64url(claims_json) "." base64url(signature)`.
//!
//! The signature is Ed25519 over the exact claims bytes as transmitted, so
//! verification never re-serializes the claims.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims carried by a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    pub sub: String,
    /// Roles granted to the subject.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued-at, seconds since epoch.
    pub iat: u64,
    /// Expiry, seconds since epoch.
    pub exp: u64,
}

/// A parsed-but-unverified bearer token.
///
/// Holding one proves only that the credential was well-formed; the
/// signature and expiry have not been checked yet.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub claims: Claims,
    /// The exact claims bytes the signature covers.
    pub claims_bytes: Vec<u8>,
    pub signature: [u8; 64],
}

/// Parse a raw credential string into its claims and signature halves.
///
/// Any structural defect — wrong segment count, invalid base64, claims
/// that are not valid JSON, a signature that is not 64 bytes — fails with
/// `MalformedToken`.
pub fn parse_token(credential: &str) -> AuthResult<UnverifiedToken> {
    let mut segments = credential.split('.');
    let (claims_b64, sig_b64) = match (segments.next(), segments.next(), segments.next()) {
        (Some(c), Some(s), None) if !c.is_empty() && !s.is_empty() => (c, s),
        _ => return Err(AuthError::MalformedToken),
    };

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| AuthError::MalformedToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::MalformedToken)?;

    let claims: Claims =
        serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::MalformedToken)?;

    let signature: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| AuthError::MalformedToken)?;

    Ok(UnverifiedToken {
        claims,
        claims_bytes,
        signature,
    })
}

/// Assemble a credential string from claims bytes and a signature.
pub(crate) fn encode_token(claims_bytes: &[u8], signature: &[u8; 64]) -> String {
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(claims_bytes),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_credential(claims: &Claims) -> String {
        let claims_bytes = serde_json::to_vec(claims).unwrap();
        encode_token(&claims_bytes, &[0u8; 64])
    }

    #[test]
    fn test_parse_well_formed() {
        let claims = Claims {
            sub: "alice".into(),
            roles: vec!["operator".into()],
            iat: 1000,
            exp: 2000,
        };
        let token = parse_token(&make_credential(&claims)).unwrap();
        assert_eq!(token.claims, claims);
        assert_eq!(token.signature, [0u8; 64]);
    }

    #[test]
    fn test_parse_rejects_missing_segment() {
        assert_eq!(parse_token("onlyonesegment"), err_malformed());
    }

    #[test]
    fn test_parse_rejects_extra_segment() {
        let claims_b64 = URL_SAFE_NO_PAD.encode(b"{}");
        let credential = format!("{claims_b64}.{claims_b64}.{claims_b64}");
        assert_eq!(parse_token(&credential), err_malformed());
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert_eq!(parse_token("!!!.???"), err_malformed());
    }

    #[test]
    fn test_parse_rejects_non_json_claims() {
        let claims_b64 = URL_SAFE_NO_PAD.encode(b"not json");
        let sig_b64 = URL_SAFE_NO_PAD.encode([0u8; 64]);
        assert_eq!(parse_token(&format!("{claims_b64}.{sig_b64}")), err_malformed());
    }

    #[test]
    fn test_parse_rejects_short_signature() {
        let claims = Claims {
            sub: "alice".into(),
            roles: vec![],
            iat: 0,
            exp: 1,
        };
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let sig_b64 = URL_SAFE_NO_PAD.encode([0u8; 32]);
        assert_eq!(parse_token(&format!("{claims_b64}.{sig_b64}")), err_malformed());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(parse_token(""), err_malformed());
        assert_eq!(parse_token("."), err_malformed());
    }

    fn err_malformed() -> AuthResult<UnverifiedToken> {
        Err(AuthError::MalformedToken)
    }
}

#[cfg(test)]
impl PartialEq for UnverifiedToken {
    fn eq(&self, other: &Self) -> bool {
        self.claims == other.claims
            && self.claims_bytes == other.claims_bytes
            && self.signature == other.signature
    }
}
