//! The generation-provider collaborator seam.
//!
//! A [`ProviderClient`] carries one translated request to a provider
//! endpoint and returns the raw response or a categorized failure. The
//! router owns no transport; the composition root injects the client.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::ProviderFailure;
use crate::profile::ProviderProfile;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Deliver one wire request to the profile's endpoint.
    ///
    /// Implementations may suspend the calling task but must not block the
    /// thread. Cancellation of the returned future must cancel the
    /// downstream request.
    async fn complete(
        &self,
        profile: &ProviderProfile,
        wire_request: &Value,
    ) -> Result<Value, ProviderFailure>;
}

// ---------------------------------------------------------------------------
// MockProviderClient — scripted outcomes for tests
// ---------------------------------------------------------------------------

/// One scripted behavior for a named profile.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Succeed with this raw response.
    Succeed(Value),
    /// Fail with this categorized error.
    Fail(ProviderFailure),
    /// Never resolve (stands in for a hung provider).
    Hang,
}

/// Scripted provider client. Records per-profile call counts so tests can
/// assert that a denied or skipped provider was never invoked.
#[derive(Default)]
pub struct MockProviderClient {
    behaviors: Mutex<Vec<(String, MockBehavior)>>,
    calls: AtomicUsize,
}

impl MockProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, profile_name: &str, behavior: MockBehavior) -> Self {
        self.behaviors
            .lock()
            .expect("mock behaviors lock poisoned")
            .push((profile_name.to_string(), behavior));
        self
    }

    /// Total calls across all profiles.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockProviderClient {
    async fn complete(
        &self,
        profile: &ProviderProfile,
        _wire_request: &Value,
    ) -> Result<Value, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = {
            let behaviors = self.behaviors.lock().expect("mock behaviors lock poisoned");
            behaviors
                .iter()
                .find(|(name, _)| name == profile.name.as_str())
                .map(|(_, behavior)| behavior.clone())
        };
        match behavior {
            Some(MockBehavior::Succeed(value)) => Ok(value),
            Some(MockBehavior::Fail(failure)) => Err(failure),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
            None => Err(ProviderFailure::ServerError { status: 500 }),
        }
    }
}
