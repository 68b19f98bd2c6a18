//! Warden root library.
//!
//! The composition root for the invocation gateway: it constructs the
//! authentication guard, authorization engine, provider router, and
//! orchestrator, wires their collaborators, and exposes the
//! transport-facing entry point [`handle_invocation`]. No subsystem is an
//! ambient global; everything is built here and injected.

pub mod config;
pub mod error;
pub mod http;
pub mod providers;

pub use config::{AuthConfig, PolicyConfig, ProviderConfig, RootConfig, ServerConfig};
pub use error::{RootError, RootResult};
pub use providers::HttpProviderClient;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use warden_agent::{
    EchoToolExecutor, InMemoryCheckpointStore, Orchestrator, ToolCallRequest, ToolCallResult,
};
use warden_auth::{AuthenticationGuard, TestIssuer};
use warden_core::{
    EventSink, ModelVersion, Principal, SecretRef, StaticSecretSource, TracingEventSink,
};
use warden_policy::{
    AuthorizationEngine, AuthorizationModel, InMemoryTupleStore, RelationName, RelationRewrite,
};
use warden_router::{
    AdapterRegistry, ProfileSet, ProviderClient, ProviderProfile, ProviderRouter, SharedProfiles,
};

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// Redacted error surfaced to callers: a stable code plus a safe message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Transport response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolCallResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl InvocationResponse {
    pub fn success(result: ToolCallResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(code: &str, message: String) -> Self {
        Self {
            result: None,
            error: Some(WireError {
                code: code.to_string(),
                message,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Root state
// ---------------------------------------------------------------------------

/// Runtime state for the gateway. Created by [`initialize_root`], consumed
/// by [`handle_invocation`] and [`shutdown_root`].
pub struct RootState {
    pub config: RootConfig,
    initialized: bool,
    guard: AuthenticationGuard,
    engine: Arc<AuthorizationEngine>,
    orchestrator: Arc<Orchestrator>,
    profiles: Arc<SharedProfiles>,
    /// Present only when `auth.dev_issuer` is enabled. Non-production.
    pub dev_issuer: Option<TestIssuer>,
}

impl RootState {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The authorization engine, for administrative tuple operations.
    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    /// Atomically replace the active provider profile set.
    pub fn reload_profiles(&self, set: ProfileSet) {
        self.profiles.swap(set);
    }
}

/// The default authorization model published at startup:
/// `executor = direct ∪ owner ∪ member-of(org)` on tools.
pub fn default_model() -> RootResult<AuthorizationModel> {
    let rel = |name: &str| RelationName::new(name).map_err(RootError::Policy);
    Ok(AuthorizationModel::builder(ModelVersion::initial())
        .relation("tool", rel("owner")?, RelationRewrite::Direct)
        .relation("tool", rel("org")?, RelationRewrite::Direct)
        .relation(
            "tool",
            rel("executor")?,
            RelationRewrite::union(vec![
                RelationRewrite::Direct,
                RelationRewrite::ComputedUserset {
                    relation: rel("owner")?,
                },
                RelationRewrite::TupleToUserset {
                    tupleset_relation: rel("org")?,
                    computed_relation: rel("member")?,
                },
            ]),
        )
        .relation("org", rel("member")?, RelationRewrite::Direct)
        .build()
        .map_err(RootError::Policy)?)
}

/// Initialize the gateway with the default HTTP provider transport.
pub fn initialize_root(config: RootConfig) -> RootResult<RootState> {
    let secrets = Arc::new(static_secrets(&config));
    let client = Arc::new(HttpProviderClient::new(secrets));
    initialize_root_with_client(config, client)
}

/// Initialize the gateway with an injected provider client. This is the
/// composition seam tests use to substitute a scripted transport.
pub fn initialize_root_with_client(
    config: RootConfig,
    client: Arc<dyn ProviderClient>,
) -> RootResult<RootState> {
    config.validate()?;

    info!(
        bind = %config.server.bind,
        port = config.server.port,
        providers = config.providers.len(),
        dev_issuer = config.auth.dev_issuer,
        "initializing warden gateway"
    );

    let sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    // Authentication guard: dev issuer or configured public key.
    let (guard, dev_issuer) = if config.auth.dev_issuer {
        let issuer = TestIssuer::generate();
        let guard = AuthenticationGuard::new(issuer.verifying_key(), sink.clone());
        tracing::warn!("dev issuer enabled; credentials are locally minted (non-production)");
        (guard, Some(issuer))
    } else {
        let key_hex = config
            .auth
            .verifying_key_hex
            .as_ref()
            .ok_or_else(|| RootError::Config("verifying_key_hex required".into()))?;
        let key_bytes = hex::decode(key_hex)
            .map_err(|_| RootError::Config("verifying_key_hex is not valid hex".into()))?;
        let guard = AuthenticationGuard::from_public_key_bytes(&key_bytes, sink.clone())
            .map_err(RootError::Auth)?;
        (guard, None)
    };

    // Authorization engine over the volatile store, default model published.
    let engine = Arc::new(
        AuthorizationEngine::new(Arc::new(InMemoryTupleStore::new()))
            .with_check_budget(Duration::from_millis(config.policy.check_budget_ms)),
    );
    engine.publish_model(default_model()?).map_err(RootError::Policy)?;

    // Provider router over the configured profiles.
    let profile_set = if config.providers.is_empty() {
        None
    } else {
        let profiles: Vec<ProviderProfile> = config
            .providers
            .iter()
            .map(|p| ProviderProfile {
                name: p.name.as_str().into(),
                dialect: p.dialect.clone(),
                credential_ref: SecretRef::new(p.credential_ref.clone()),
                endpoint: p.endpoint.clone(),
                priority: p.priority,
            })
            .collect();
        Some(ProfileSet::new(profiles).map_err(RootError::Router)?)
    };
    let profiles = Arc::new(SharedProfiles::new(match profile_set {
        Some(set) => set,
        // An empty set is rejected by ProfileSet; represent "no providers"
        // with a placeholder that the router will fail fast on.
        None => ProfileSet::new(vec![ProviderProfile {
            name: "unconfigured".into(),
            dialect: "openai".into(),
            credential_ref: SecretRef::new("unconfigured"),
            endpoint: String::new(),
            priority: u32::MAX,
        }])
        .map_err(RootError::Router)?,
    }));
    let router = Arc::new(
        ProviderRouter::new(AdapterRegistry::with_defaults(), client).with_event_sink(sink.clone()),
    );

    let orchestrator = Arc::new(
        Orchestrator::new(
            engine.clone(),
            router,
            profiles.clone(),
            Arc::new(EchoToolExecutor::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        )
        .with_event_sink(sink),
    );

    info!("warden gateway initialized");

    Ok(RootState {
        config,
        initialized: true,
        guard,
        engine,
        orchestrator,
        profiles,
        dev_issuer,
    })
}

fn static_secrets(config: &RootConfig) -> StaticSecretSource {
    let mut source = StaticSecretSource::new();
    for (name, value) in &config.secrets {
        source = source.with(name.as_str(), value.as_str());
    }
    source
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

/// Authenticate the credential and run the request through the
/// orchestrator. Every failure is redacted into a [`WireError`]; raw
/// internal detail stays in the logs.
pub async fn handle_invocation(
    state: &RootState,
    credential: &str,
    request: ToolCallRequest,
) -> InvocationResponse {
    if !state.is_initialized() {
        return InvocationResponse::failure("root/uninitialized", "gateway not initialized".into());
    }

    let principal: Principal = match state.guard.verify(credential) {
        Ok(principal) => principal,
        Err(err) => {
            return InvocationResponse::failure(err.code(), err.to_string());
        }
    };

    info!(
        subject = %principal.subject_id,
        request_id = %request.request_id,
        conversation = %request.conversation_id,
        "handling invocation"
    );

    match state.orchestrator.handle(&principal, request).await {
        Ok(result) => InvocationResponse::success(result),
        Err(err) => {
            tracing::warn!(error = %err, code = err.code(), "invocation failed");
            InvocationResponse::failure(err.code(), err.public_message())
        }
    }
}

/// Gracefully release subsystems. Idempotent.
pub fn shutdown_root(state: &mut RootState) -> RootResult<()> {
    if !state.initialized {
        return Ok(());
    }
    info!("shutting down warden gateway");
    state.initialized = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{ConversationId, RequestId};
    use warden_router::{ChatMessage, GenerationRequest, MockBehavior, MockProviderClient};

    fn dev_config() -> RootConfig {
        RootConfig {
            auth: AuthConfig {
                verifying_key_hex: None,
                dev_issuer: true,
            },
            providers: vec![ProviderConfig {
                name: "primary".into(),
                dialect: "openai".into(),
                credential_ref: "primary-key".into(),
                endpoint: "https://primary.example/v1".into(),
                priority: 1,
            }],
            ..RootConfig::default()
        }
    }

    fn ok_response(text: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1},
        })
    }

    fn make_state() -> RootState {
        let client = Arc::new(
            MockProviderClient::new().with("primary", MockBehavior::Succeed(ok_response("pong"))),
        );
        initialize_root_with_client(dev_config(), client).unwrap()
    }

    fn chat_request(request: &str) -> ToolCallRequest {
        ToolCallRequest {
            request_id: RequestId::new(request),
            conversation_id: ConversationId::new("conv-1"),
            actions: vec![],
            message: ChatMessage::user("ping"),
            generation: GenerationRequest::default(),
        }
    }

    #[test]
    fn test_initialize_requires_valid_config() {
        let config = RootConfig::default();
        assert!(initialize_root(config).is_err());
    }

    #[test]
    fn test_initialize_dev_mode() {
        let state = make_state();
        assert!(state.is_initialized());
        assert!(state.dev_issuer.is_some());
    }

    #[tokio::test]
    async fn test_invocation_with_valid_credential() {
        let state = make_state();
        let credential = state.dev_issuer.as_ref().unwrap().issue("alice", &[], 3600);
        let response = handle_invocation(&state, &credential, chat_request("r1")).await;
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap().content, "pong");
    }

    #[tokio::test]
    async fn test_invocation_with_bad_credential() {
        let state = make_state();
        let response = handle_invocation(&state, "garbage", chat_request("r1")).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, "auth/malformed_token");
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_invocation_with_expired_credential() {
        let state = make_state();
        let credential = state.dev_issuer.as_ref().unwrap().issue("alice", &[], 0);
        let response = handle_invocation(&state, &credential, chat_request("r1")).await;
        assert_eq!(response.error.unwrap().code, "auth/expired_token");
    }

    #[tokio::test]
    async fn test_invocation_after_shutdown() {
        let mut state = make_state();
        shutdown_root(&mut state).unwrap();
        shutdown_root(&mut state).unwrap(); // idempotent
        let response = handle_invocation(&state, "x", chat_request("r1")).await;
        assert_eq!(response.error.unwrap().code, "root/uninitialized");
    }

    #[test]
    fn test_default_model_is_valid() {
        let model = default_model().unwrap();
        assert!(model.validate().is_ok());
        assert_eq!(model.version, ModelVersion::initial());
    }

    #[test]
    fn test_response_serialization_omits_empty_half() {
        let response = InvocationResponse::failure("x/y", "nope".into());
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"error\""));
    }
}
