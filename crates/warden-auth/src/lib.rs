//! Warden authentication — bearer credential verification.
//!
//! The [`AuthenticationGuard`] validates an inbound credential's structure,
//! Ed25519 signature, and expiry, producing a [`warden_core::Principal`]
//! scoped to one request. Failure is terminal: there is no retry path, and
//! the only side effect is a single observability event.
//!
//! The guard holds public verification material only. Credential issuance
//! belongs to an external issuer; [`TestIssuer`] covers tests and the
//! explicitly non-production dev-issuer mode.

pub mod error;
pub mod guard;
pub mod issuer;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use guard::{AuthenticationGuard, CLOCK_SKEW_LEEWAY_SECS};
pub use issuer::TestIssuer;
pub use token::{parse_token, Claims, UnverifiedToken};
