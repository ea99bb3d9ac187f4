// --- File: crates/courier_push/src/fcm.rs ---
//! Firebase Cloud Messaging adapter (HTTP v1 API).
//!
//! Supports single-token and topic targets. Multi-token targets are sent
//! one request per token since the v1 API has no multicast endpoint; user
//! targets are resolved to tokens upstream by the device registry. A 404
//! from FCM means the registration token is dead, which the facade uses to
//! mark the token invalid.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use courier_common::cache::TtlCache;
use courier_common::error::{external_service_error, validation_error, CourierError};
use courier_common::services::{
    BoxFuture, Channel, ChannelProvider, DispatchResult, PushMessage, PushTarget,
};
use courier_config::FcmConfig;

use crate::auth::get_fcm_auth_token;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://fcm.googleapis.com";

/// Marker the facade looks for to detect dead registration tokens.
pub const UNREGISTERED_MARKER: &str = "UNREGISTERED";

#[derive(Debug, Serialize)]
struct FcmEnvelope {
    message: FcmMessage,
}

#[derive(Debug, Serialize)]
struct FcmMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    notification: FcmNotification,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    /// "projects/{project_id}/messages/{message_id}"
    name: String,
}

// Google access tokens live for an hour; refresh well before expiry.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

pub struct FcmProvider {
    config: FcmConfig,
    base_url: String,
    /// Test hook: bypass the OAuth exchange with a fixed token.
    static_token: Option<String>,
    token_cache: TtlCache<String>,
}

impl FcmProvider {
    pub fn new(config: &FcmConfig) -> Self {
        Self {
            config: config.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            static_token: None,
            token_cache: TtlCache::new("fcm-auth", TOKEN_TTL),
        }
    }

    /// Point the adapter at a different API host, for tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_static_token(mut self, token: impl Into<String>) -> Self {
        self.static_token = Some(token.into());
        self
    }

    fn envelope(message: &PushMessage, token: Option<String>, topic: Option<String>) -> FcmEnvelope {
        FcmEnvelope {
            message: FcmMessage {
                token,
                topic,
                notification: FcmNotification {
                    title: message.title.clone(),
                    body: message.body.clone(),
                    image: message.image_url.clone(),
                },
                data: if message.data.is_empty() {
                    None
                } else {
                    Some(message.data.clone())
                },
            },
        }
    }

    async fn auth_token(&self) -> Result<String, CourierError> {
        match &self.static_token {
            Some(token) => Ok(token.clone()),
            None => {
                self.token_cache
                    .get_or_load("access_token", || get_fcm_auth_token(&self.config))
                    .await
            }
        }
    }

    async fn post_one(&self, token: &str, envelope: &FcmEnvelope) -> Result<String, CourierError> {
        let url = format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.config.project_id
        );
        let response = HTTP_CLIENT
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .json(envelope)
            .send()
            .await
            .map_err(|e| external_service_error("fcm", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 404 means the registration token no longer exists.
            let detail = if status == StatusCode::NOT_FOUND || body.contains(UNREGISTERED_MARKER) {
                format!("{UNREGISTERED_MARKER}: {status}: {body}")
            } else {
                format!("{status}: {body}")
            };
            return Err(external_service_error("fcm", detail));
        }

        let parsed: FcmResponse = response
            .json()
            .await
            .map_err(|e| external_service_error("fcm", format!("bad response: {e}")))?;
        Ok(parsed.name)
    }
}

impl ChannelProvider<PushMessage> for FcmProvider {
    fn send(&self, message: PushMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let auth = self.auth_token().await?;
            match &message.target {
                PushTarget::Token(token) => {
                    let envelope = Self::envelope(&message, Some(token.clone()), None);
                    let name = self.post_one(&auth, &envelope).await?;
                    info!(message_id = %name, "Push accepted by FCM");
                    Ok(DispatchResult::sent(name))
                }
                PushTarget::Topic(topic) => {
                    let envelope = Self::envelope(&message, None, Some(topic.clone()));
                    let name = self.post_one(&auth, &envelope).await?;
                    info!(topic = %topic, message_id = %name, "Topic push accepted by FCM");
                    Ok(DispatchResult::sent(name))
                }
                PushTarget::Tokens(tokens) => {
                    if tokens.is_empty() {
                        return Err(validation_error("push target has no tokens"));
                    }
                    // One request per token; succeed if any device was reached.
                    let mut first_id = None;
                    let mut failures = 0usize;
                    let mut last_error = None;
                    for token in tokens {
                        let envelope = Self::envelope(&message, Some(token.clone()), None);
                        match self.post_one(&auth, &envelope).await {
                            Ok(name) => {
                                first_id.get_or_insert(name);
                            }
                            Err(err) => {
                                warn!(error = %err, "FCM send to one token failed");
                                failures += 1;
                                last_error = Some(err);
                            }
                        }
                    }
                    match (first_id, last_error) {
                        (Some(id), _) => {
                            if failures > 0 {
                                warn!(failures, total = tokens.len(), "Partial multicast delivery");
                            }
                            Ok(DispatchResult::sent(id))
                        }
                        (None, Some(err)) => Err(err),
                        (None, None) => Err(external_service_error("fcm", "no tokens attempted")),
                    }
                }
                PushTarget::Users(_) => Err(validation_error(
                    "fcm cannot address users directly; resolve device tokens first",
                )),
            }
        })
    }

    fn backend(&self) -> &'static str {
        "fcm"
    }

    fn channel(&self) -> Channel {
        Channel::Push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> FcmProvider {
        FcmProvider::new(&FcmConfig {
            project_id: "demo-project".into(),
            key_path: "/dev/null".into(),
        })
        .with_base_url(server.uri())
        .with_static_token("test-token")
    }

    fn push_to(target: PushTarget) -> PushMessage {
        PushMessage {
            target,
            title: "Invoice paid".into(),
            body: "CHF 120.00 received".into(),
            image_url: None,
            data: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn token_target_posts_v1_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/demo-project/messages:send"))
            .and(body_partial_json(json!({
                "message": { "token": "device-1", "notification": { "title": "Invoice paid" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/demo-project/messages/m-1"
            })))
            .mount(&server)
            .await;

        let result = provider(&server)
            .send(push_to(PushTarget::Token("device-1".into())))
            .await
            .unwrap();
        assert_eq!(
            result.provider_message_id.as_deref(),
            Some("projects/demo-project/messages/m-1")
        );
    }

    #[tokio::test]
    async fn dead_token_is_marked_unregistered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/demo-project/messages:send"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "status": "NOT_FOUND", "message": "Requested entity was not found." }
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .send(push_to(PushTarget::Token("gone".into())))
            .await
            .unwrap_err();
        match err {
            CourierError::ExternalServiceError { message, .. } => {
                assert!(message.contains(UNREGISTERED_MARKER));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_target_is_rejected() {
        let server = MockServer::start().await;
        let err = provider(&server)
            .send(push_to(PushTarget::Users(vec!["u1".into()])))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::ValidationError(_)));
    }
}
