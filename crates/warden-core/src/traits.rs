use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use zeroize::Zeroizing;

use crate::error::CoreResult;
use crate::types::{RequestId, SecretRef, Timestamp};

// ---------------------------------------------------------------------------
// EventSink — fire-and-forget observability events
//
// The pipeline never blocks on delivery. A sink that performs I/O must
// buffer internally; emit returns immediately.
// ---------------------------------------------------------------------------

/// Kinds of structured events the pipeline emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    AuthenticationFailed,
    AuthorizationDenied,
    AuthorizationGranted,
    AuthorizationTimedOut,
    ProviderAttempted,
    ProviderFellBack,
    ProvidersExhausted,
    CheckpointCommitted,
}

/// One structured observability event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub kind: EventKind,
    pub timestamp: Timestamp,
    pub request_id: Option<RequestId>,
    pub detail: String,
}

impl ObservedEvent {
    pub fn new(kind: EventKind, request_id: Option<RequestId>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Timestamp::now(),
            request_id,
            detail: detail.into(),
        }
    }
}

/// Trait for emitting observability events. Fire-and-forget: implementations
/// must not block the caller waiting for delivery.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ObservedEvent);
}

/// Sink that forwards events to `tracing` at info/warn level.
#[derive(Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ObservedEvent) {
        match event.kind {
            EventKind::AuthenticationFailed
            | EventKind::AuthorizationDenied
            | EventKind::AuthorizationTimedOut
            | EventKind::ProvidersExhausted => {
                tracing::warn!(
                    kind = ?event.kind,
                    request_id = event.request_id.as_ref().map(|r| r.as_str()),
                    detail = %event.detail,
                    "pipeline event"
                );
            }
            _ => {
                tracing::info!(
                    kind = ?event.kind,
                    request_id = event.request_id.as_ref().map(|r| r.as_str()),
                    detail = %event.detail,
                    "pipeline event"
                );
            }
        }
    }
}

/// In-memory sink for testing.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<ObservedEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events
            .lock()
            .expect("event sink lock poisoned")
            .clone()
    }

    pub fn count_of(&self, kind: &EventKind) -> usize {
        self.events().iter().filter(|e| &e.kind == kind).count()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: ObservedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretSource — provider credentials by logical name
//
// The core never reads raw secret material from disk or environment; it
// asks a SecretSource to resolve a SecretRef.
// ---------------------------------------------------------------------------

pub trait SecretSource: Send + Sync {
    /// Resolve a secret by logical name. `Ok(None)` means the name is not
    /// provisioned; errors are reserved for backend failures.
    fn resolve(&self, name: &SecretRef) -> CoreResult<Option<Zeroizing<String>>>;
}

/// Static map-backed secret source for tests and TOML-provisioned secrets.
#[derive(Default)]
pub struct StaticSecretSource {
    entries: Vec<(SecretRef, String)>,
}

impl StaticSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<SecretRef>, value: impl Into<String>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }
}

impl SecretSource for StaticSecretSource {
    fn resolve(&self, name: &SecretRef) -> CoreResult<Option<Zeroizing<String>>> {
        Ok(self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| Zeroizing::new(v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait objects are object-safe
    fn _assert_sink_object_safe(_: &dyn EventSink) {}
    fn _assert_secrets_object_safe(_: &dyn SecretSource) {}

    #[test]
    fn test_in_memory_sink_records() {
        let sink = InMemoryEventSink::new();
        sink.emit(ObservedEvent::new(
            EventKind::AuthorizationGranted,
            Some(RequestId::new("req-1")),
            "check passed",
        ));
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.count_of(&EventKind::AuthorizationGranted), 1);
        assert_eq!(sink.count_of(&EventKind::AuthorizationDenied), 0);
    }

    #[test]
    fn test_static_secret_source_resolves() {
        let source = StaticSecretSource::new().with("provider-a-key", "s3cr3t");
        let resolved = source.resolve(&SecretRef::new("provider-a-key")).unwrap();
        assert_eq!(resolved.as_deref().map(String::as_str), Some("s3cr3t"));
    }

    #[test]
    fn test_static_secret_source_missing() {
        let source = StaticSecretSource::new();
        let resolved = source.resolve(&SecretRef::new("nope")).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_observed_event_serialization() {
        let event = ObservedEvent::new(EventKind::ProviderFellBack, None, "provider-a -> provider-b");
        let json = serde_json::to_string(&event).unwrap();
        let restored: ObservedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.kind, restored.kind);
        assert_eq!(event.detail, restored.detail);
    }
}
