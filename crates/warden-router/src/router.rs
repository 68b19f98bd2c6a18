//! The provider fallback chain.
//!
//! `invoke` normalizes the caller's messages once, then walks the profile
//! set in priority order. Transient failures record an attempt and advance;
//! permanent failures abort the chain immediately — they indicate a caller
//! or configuration defect that fallback would only mask. The async
//! `invoke` holds the only decision logic; `invoke_blocking` is a thin
//! wrapper over it, so the two paths cannot diverge.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_core::{EventKind, EventSink, ObservedEvent, ProfileName, TracingEventSink};

use crate::adapter::AdapterRegistry;
use crate::client::ProviderClient;
use crate::error::{ErrorClass, ProviderFailure, RouterError, RouterResult};
use crate::health::HealthRegistry;
use crate::message::{validate_messages, ChatMessage, GenerationRequest, GenerationResult};
use crate::profile::{ProfileSet, ProviderProfile};

/// Per-attempt timeout in milliseconds. Deliberately much longer than the
/// authorization check budget: generation latency must never be bounded by
/// policy latency or vice versa.
pub const ATTEMPT_TIMEOUT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// InvocationAttempt
// ---------------------------------------------------------------------------

/// Outcome of one attempt in the fallback chain.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttemptOutcome {
    Succeeded,
    TransientFailure(ProviderFailure),
    /// The provider's circuit was open; it was skipped without a call.
    CircuitOpen,
}

/// Diagnostic record of one attempt. Lives only for the duration of the
/// chain; the exhausted error and the successful result both carry the log.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InvocationAttempt {
    pub provider: ProfileName,
    pub latency_ms: u64,
    pub outcome: AttemptOutcome,
}

// ---------------------------------------------------------------------------
// ProviderRouter
// ---------------------------------------------------------------------------

/// Routes generation requests across configured providers with automatic
/// fallback. Construction takes every collaborator explicitly.
pub struct ProviderRouter {
    adapters: AdapterRegistry,
    client: Arc<dyn ProviderClient>,
    health: HealthRegistry,
    sink: Arc<dyn EventSink>,
    attempt_timeout: Duration,
}

impl ProviderRouter {
    pub fn new(adapters: AdapterRegistry, client: Arc<dyn ProviderClient>) -> Self {
        Self {
            adapters,
            client,
            health: HealthRegistry::new(),
            sink: Arc::new(TracingEventSink),
            attempt_timeout: Duration::from_millis(ATTEMPT_TIMEOUT_MS),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Override the per-attempt timeout. Intended for tests.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Attempt the profiles in priority order until one succeeds.
    ///
    /// Cancellation-safe: the in-flight provider call is awaited directly,
    /// so dropping this future cancels the downstream request too.
    pub async fn invoke(
        &self,
        messages: &[ChatMessage],
        request: &GenerationRequest,
        profiles: &ProfileSet,
    ) -> RouterResult<GenerationResult> {
        validate_messages(messages)?;

        let mut attempts: Vec<InvocationAttempt> = Vec::new();

        for profile in profiles.ordered() {
            if !self.health.should_attempt(&profile.name) {
                attempts.push(InvocationAttempt {
                    provider: profile.name.clone(),
                    latency_ms: 0,
                    outcome: AttemptOutcome::CircuitOpen,
                });
                continue;
            }

            let adapter = self.adapters.get(&profile.dialect)?;
            let wire_request = adapter.translate_request(messages, request)?;

            self.sink.emit(ObservedEvent::new(
                EventKind::ProviderAttempted,
                None,
                profile.name.as_str(),
            ));

            let start = Instant::now();
            let outcome = self.attempt(profile, &wire_request).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(raw) => {
                    let reply = adapter.translate_response(&raw)?;
                    self.health.record_success(&profile.name);
                    attempts.push(InvocationAttempt {
                        provider: profile.name.clone(),
                        latency_ms,
                        outcome: AttemptOutcome::Succeeded,
                    });
                    tracing::debug!(
                        provider = %profile.name,
                        latency_ms,
                        "generation succeeded"
                    );
                    return Ok(GenerationResult {
                        content: reply.content,
                        usage: reply.usage,
                        finish_reason: reply.finish_reason,
                        provider: profile.name.clone(),
                        attempts,
                    });
                }
                Err(failure) => match adapter.classify_error(&failure) {
                    ErrorClass::Transient => {
                        self.health.record_failure(&profile.name);
                        tracing::warn!(
                            provider = %profile.name,
                            failure = %failure,
                            latency_ms,
                            "transient provider failure, falling back"
                        );
                        self.sink.emit(ObservedEvent::new(
                            EventKind::ProviderFellBack,
                            None,
                            format!("{}: {failure}", profile.name),
                        ));
                        attempts.push(InvocationAttempt {
                            provider: profile.name.clone(),
                            latency_ms,
                            outcome: AttemptOutcome::TransientFailure(failure),
                        });
                    }
                    ErrorClass::Permanent => {
                        tracing::error!(
                            provider = %profile.name,
                            failure = %failure,
                            "permanent provider failure, aborting chain"
                        );
                        return Err(RouterError::Permanent {
                            provider: profile.name.clone(),
                            failure,
                            attempts,
                        });
                    }
                },
            }
        }

        self.sink.emit(ObservedEvent::new(
            EventKind::ProvidersExhausted,
            None,
            format!("{} attempts", attempts.len()),
        ));
        Err(RouterError::AllProvidersExhausted { attempts })
    }

    /// Synchronous entry point. Delegates to [`invoke`](Self::invoke) on
    /// the given runtime handle; there is no separate decision path.
    pub fn invoke_blocking(
        &self,
        handle: &tokio::runtime::Handle,
        messages: &[ChatMessage],
        request: &GenerationRequest,
        profiles: &ProfileSet,
    ) -> RouterResult<GenerationResult> {
        handle.block_on(self.invoke(messages, request, profiles))
    }

    /// One provider call under the per-attempt timeout.
    async fn attempt(
        &self,
        profile: &ProviderProfile,
        wire_request: &Value,
    ) -> Result<Value, ProviderFailure> {
        match tokio::time::timeout(
            self.attempt_timeout,
            self.client.complete(profile, wire_request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderFailure::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBehavior, MockProviderClient};
    use crate::profile::ProviderProfile;
    use serde_json::json;
    use warden_core::{InMemoryEventSink, SecretRef};

    fn profile(name: &str, priority: u32) -> ProviderProfile {
        ProviderProfile {
            name: ProfileName::new(name),
            dialect: "openai".into(),
            credential_ref: SecretRef::new(format!("{name}-key")),
            endpoint: format!("https://{name}.example/v1"),
            priority,
        }
    }

    fn ok_response(text: &str) -> Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1},
        })
    }

    fn make_router(client: MockProviderClient) -> (ProviderRouter, Arc<MockProviderClient>) {
        let client = Arc::new(client);
        let router = ProviderRouter::new(AdapterRegistry::with_defaults(), client.clone());
        (router, client)
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("hello")]
    }

    #[tokio::test]
    async fn test_first_provider_success_stops_chain() {
        let (router, client) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Succeed(ok_response("from a")))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(result.content, "from a");
        assert_eq!(result.provider.as_str(), "a");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_falls_back_and_never_reaches_third() {
        let (router, client) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::Timeout))
                .with("b", MockBehavior::Succeed(ok_response("from b")))
                .with("c", MockBehavior::Succeed(ok_response("from c"))),
        );
        let profiles =
            ProfileSet::new(vec![profile("a", 1), profile("b", 2), profile("c", 3)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(result.provider.as_str(), "b");
        assert_eq!(result.content, "from b");
        // a attempted, b attempted, c never reached
        assert_eq!(client.call_count(), 2);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].provider.as_str(), "a");
        assert!(matches!(
            result.attempts[0].outcome,
            AttemptOutcome::TransientFailure(ProviderFailure::Timeout)
        ));
        assert_eq!(result.attempts[1].outcome, AttemptOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_rate_limit_drives_fallback() {
        let (router, _) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::RateLimit))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(result.provider.as_str(), "b");
        assert!(matches!(
            result.attempts[0].outcome,
            AttemptOutcome::TransientFailure(ProviderFailure::RateLimit)
        ));
    }

    #[tokio::test]
    async fn test_permanent_failure_aborts_chain() {
        let (router, client) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::BadRequest))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await;
        match result {
            Err(RouterError::Permanent { provider, failure, .. }) => {
                assert_eq!(provider.as_str(), "a");
                assert_eq!(failure, ProviderFailure::BadRequest);
            }
            other => panic!("expected permanent failure, got {other:?}"),
        }
        assert_eq!(client.call_count(), 1, "fallback must not mask the defect");
    }

    #[tokio::test]
    async fn test_provider_auth_failure_aborts_chain() {
        let (router, client) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::Auth))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();
        assert!(matches!(
            router
                .invoke(&messages(), &GenerationRequest::default(), &profiles)
                .await,
            Err(RouterError::Permanent { .. })
        ));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_full_attempt_log() {
        let (router, _) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::RateLimit))
                .with("b", MockBehavior::Fail(ProviderFailure::ServerError { status: 502 })),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await;
        match result {
            Err(RouterError::AllProvidersExhausted { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].provider.as_str(), "a");
                assert_eq!(attempts[1].provider.as_str(), "b");
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hung_provider_times_out_and_falls_back() {
        let (router, _) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Hang)
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let router = router.with_attempt_timeout(Duration::from_millis(20));
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(result.provider.as_str(), "b");
        assert!(matches!(
            result.attempts[0].outcome,
            AttemptOutcome::TransientFailure(ProviderFailure::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_open_circuit_skips_provider_without_calling() {
        let (router, client) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::RateLimit))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        // Threshold 1, long recovery: the first failure opens a's circuit.
        let router = router.with_health(HealthRegistry::with_limits(1, 3600));
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let first = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(first.provider.as_str(), "b");
        let calls_after_first = client.call_count();

        let second = router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(second.provider.as_str(), "b");
        assert_eq!(second.attempts[0].outcome, AttemptOutcome::CircuitOpen);
        // a skipped on the second pass: only b was called again.
        assert_eq!(client.call_count(), calls_after_first + 1);
    }

    #[tokio::test]
    async fn test_unknown_dialect_fails() {
        let (router, _) = make_router(MockProviderClient::new());
        let mut bad = profile("a", 1);
        bad.dialect = "fax".into();
        let profiles = ProfileSet::new(vec![bad]).unwrap();
        assert!(matches!(
            router
                .invoke(&messages(), &GenerationRequest::default(), &profiles)
                .await,
            Err(RouterError::UnknownDialect(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_messages_rejected_before_any_call() {
        let (router, client) = make_router(MockProviderClient::new());
        let profiles = ProfileSet::new(vec![profile("a", 1)]).unwrap();
        assert!(router
            .invoke(&[], &GenerationRequest::default(), &profiles)
            .await
            .is_err());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_emits_events() {
        let sink = Arc::new(InMemoryEventSink::new());
        let client = Arc::new(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::RateLimit))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let router = ProviderRouter::new(AdapterRegistry::with_defaults(), client)
            .with_event_sink(sink.clone());
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        router
            .invoke(&messages(), &GenerationRequest::default(), &profiles)
            .await
            .unwrap();
        assert_eq!(sink.count_of(&EventKind::ProviderAttempted), 2);
        assert_eq!(sink.count_of(&EventKind::ProviderFellBack), 1);
    }

    #[test]
    fn test_invoke_blocking_shares_decision_path() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .build()
            .unwrap();
        let (router, _) = make_router(
            MockProviderClient::new()
                .with("a", MockBehavior::Fail(ProviderFailure::RateLimit))
                .with("b", MockBehavior::Succeed(ok_response("from b"))),
        );
        let profiles = ProfileSet::new(vec![profile("a", 1), profile("b", 2)]).unwrap();

        let result = router
            .invoke_blocking(
                runtime.handle(),
                &messages(),
                &GenerationRequest::default(),
                &profiles,
            )
            .unwrap();
        assert_eq!(result.provider.as_str(), "b");
        assert_eq!(result.attempts.len(), 2);
    }
}
