//! HTTP provider client.
//!
//! The one transport implementation the binary wires in. Credentials are
//! resolved through the [`SecretSource`] by logical name; the router never
//! sees raw secret material. Status codes map onto the categorized
//! failure set, so the adapters' transient/permanent classification does
//! the rest.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use warden_core::SecretSource;
use warden_router::{ProviderClient, ProviderFailure, ProviderProfile};

/// HTTP transport to generation providers.
pub struct HttpProviderClient {
    http: reqwest::Client,
    secrets: Arc<dyn SecretSource>,
}

impl HttpProviderClient {
    /// The client carries no request timeout of its own; the router's
    /// per-attempt timeout is the single budget for one call.
    pub fn new(secrets: Arc<dyn SecretSource>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            secrets,
        }
    }

    fn classify_status(status: u16) -> ProviderFailure {
        match status {
            401 | 403 => ProviderFailure::Auth,
            400 | 404 | 422 => ProviderFailure::BadRequest,
            429 => ProviderFailure::RateLimit,
            _ => ProviderFailure::ServerError { status },
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn complete(
        &self,
        profile: &ProviderProfile,
        wire_request: &Value,
    ) -> Result<Value, ProviderFailure> {
        let credential = self
            .secrets
            .resolve(&profile.credential_ref)
            .map_err(|err| {
                tracing::error!(
                    provider = %profile.name,
                    error = %err,
                    "secret source failed"
                );
                ProviderFailure::Auth
            })?
            .ok_or_else(|| {
                tracing::error!(
                    provider = %profile.name,
                    credential_ref = %profile.credential_ref,
                    "credential not provisioned"
                );
                ProviderFailure::Auth
            })?;

        let response = self
            .http
            .post(&profile.endpoint)
            .bearer_auth(credential.as_str())
            .json(wire_request)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(provider = %profile.name, error = %err, "provider transport error");
                if err.is_timeout() {
                    ProviderFailure::Timeout
                } else {
                    ProviderFailure::ServerError { status: 0 }
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(Self::classify_status(status));
        }

        response.json::<Value>().await.map_err(|err| {
            tracing::warn!(provider = %profile.name, error = %err, "provider returned non-JSON body");
            ProviderFailure::ServerError { status }
        })
    }
}
