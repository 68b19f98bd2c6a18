//! Axum HTTP transport adapter.
//!
//! The gateway consumes the structured [`ToolCallRequest`] form only; this
//! module is the thin edge that extracts the bearer credential and maps
//! the redacted error codes onto HTTP statuses.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use warden_agent::ToolCallRequest;

use crate::{handle_invocation, InvocationResponse, RootState};

/// Shared application state for Axum handlers.
pub struct AppState {
    pub root: RootState,
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/invoke", post(handle_invoke))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Extract the bearer credential from the Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.to_string())
}

/// Map a redacted error code onto an HTTP status.
fn status_for(response: &InvocationResponse) -> StatusCode {
    match &response.error {
        None => StatusCode::OK,
        Some(error) => match error.code.as_str() {
            code if code.starts_with("auth/") => StatusCode::UNAUTHORIZED,
            "agent/permission_denied" => StatusCode::FORBIDDEN,
            "agent/authorization_timeout" | "policy/timeout" => StatusCode::FORBIDDEN,
            "router/providers_exhausted" => StatusCode::SERVICE_UNAVAILABLE,
            "agent/invalid_request" | "router/invalid_message" | "policy/validation" => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// POST /invoke -- the capability invocation entry point.
async fn handle_invoke(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ToolCallRequest>,
) -> impl IntoResponse {
    let credential = match extract_bearer(&headers) {
        Some(credential) => credential,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(InvocationResponse::failure(
                    "auth/missing_credential",
                    "missing Authorization header".into(),
                )),
            );
        }
    };

    let response = handle_invocation(&state.root, &credential, request).await;
    (status_for(&response), Json(response))
}

/// GET /health -- liveness and configuration summary.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "initialized": state.root.is_initialized(),
        "model_version": state.root.engine().model_version().map(|v| v.to_string()),
        "dev_issuer": state.root.dev_issuer.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(extract_bearer(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_extract_bearer_missing_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(extract_bearer(&headers).is_none());
        assert!(extract_bearer(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_status_mapping() {
        let ok = InvocationResponse::success(warden_agent::ToolCallResult {
            request_id: warden_core::RequestId::new("r"),
            content: String::new(),
            tool_outputs: vec![],
        });
        assert_eq!(status_for(&ok), StatusCode::OK);

        let auth = InvocationResponse::failure("auth/expired_token", "expired token".into());
        assert_eq!(status_for(&auth), StatusCode::UNAUTHORIZED);

        let denied = InvocationResponse::failure("agent/permission_denied", "no".into());
        assert_eq!(status_for(&denied), StatusCode::FORBIDDEN);

        let exhausted = InvocationResponse::failure("router/providers_exhausted", "".into());
        assert_eq!(status_for(&exhausted), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = InvocationResponse::failure("agent/checkpoint", "".into());
        assert_eq!(status_for(&unknown), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
