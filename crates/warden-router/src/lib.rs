//! Warden router — provider routing with automatic fallback.
//!
//! Caller messages are normalized once into the canonical [`ChatMessage`]
//! envelope. Each configured [`ProviderProfile`] names a wire dialect; the
//! matching [`ProviderAdapter`] translates the envelope to and from that
//! dialect, and classifies the provider's categorized failures. The
//! [`ProviderRouter`] walks profiles in priority order: transient failures
//! (rate limit, 5xx, timeout) fall back to the next profile, permanent
//! failures (bad request, provider auth) abort the chain, and exhaustion
//! surfaces the full attempt log.

pub mod adapter;
pub mod client;
pub mod error;
pub mod health;
pub mod message;
pub mod profile;
pub mod router;

pub use adapter::{AdapterRegistry, AnthropicAdapter, OpenAiAdapter, ProviderAdapter};
pub use client::{MockBehavior, MockProviderClient, ProviderClient};
pub use error::{ErrorClass, ProviderFailure, RouterError, RouterResult};
pub use health::{CircuitState, HealthRegistry, ProviderHealth, OPEN_THRESHOLD, RECOVERY_TIMEOUT_SECS};
pub use message::{
    validate_messages, ChatMessage, FinishReason, GenerationRequest, GenerationResult,
    ProviderReply, Role, ToolCallSpec, Usage,
};
pub use profile::{ProfileSet, ProviderProfile, SharedProfiles};
pub use router::{AttemptOutcome, InvocationAttempt, ProviderRouter, ATTEMPT_TIMEOUT_MS};
