// --- File: crates/courier_push/src/onesignal.rs ---
//! OneSignal REST adapter.
//!
//! Unlike FCM, OneSignal can address external user ids directly, so the
//! `Users` target needs no token fan-out.

use once_cell::sync::Lazy;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use courier_common::error::{external_service_error, validation_error, CourierError};
use courier_common::services::{
    BoxFuture, Channel, ChannelProvider, DispatchResult, PushMessage, PushTarget,
};
use courier_config::OneSignalConfig;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://onesignal.com";

#[derive(Deserialize)]
struct OneSignalResponse {
    id: String,
}

pub struct OneSignalProvider {
    config: OneSignalConfig,
    base_url: String,
}

impl OneSignalProvider {
    pub fn new(config: &OneSignalConfig) -> Self {
        Self {
            config: config.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API host, for tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_payload(&self, message: &PushMessage) -> Result<Value, CourierError> {
        let mut payload = json!({
            "app_id": self.config.app_id,
            "headings": { "en": message.title },
            "contents": { "en": message.body },
        });

        match &message.target {
            PushTarget::Token(token) => {
                payload["include_player_ids"] = json!([token]);
            }
            PushTarget::Tokens(tokens) => {
                if tokens.is_empty() {
                    return Err(validation_error("push target has no tokens"));
                }
                payload["include_player_ids"] = json!(tokens);
            }
            PushTarget::Users(user_ids) => {
                if user_ids.is_empty() {
                    return Err(validation_error("push target has no user ids"));
                }
                payload["include_external_user_ids"] = json!(user_ids);
            }
            PushTarget::Topic(topic) => {
                payload["included_segments"] = json!([topic]);
            }
        }

        if !message.data.is_empty() {
            payload["data"] = json!(message.data);
        }
        if let Some(image) = &message.image_url {
            payload["big_picture"] = json!(image);
        }
        Ok(payload)
    }
}

impl ChannelProvider<PushMessage> for OneSignalProvider {
    fn send(&self, message: PushMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let payload = self.build_payload(&message)?;
            let url = format!("{}/api/v1/notifications", self.base_url);

            let response = HTTP_CLIENT
                .post(&url)
                .header(
                    header::AUTHORIZATION,
                    format!("Basic {}", self.config.api_key),
                )
                .json(&payload)
                .send()
                .await
                .map_err(|e| external_service_error("onesignal", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error(
                    "onesignal",
                    format!("{status}: {body}"),
                ));
            }

            let parsed: OneSignalResponse = response
                .json()
                .await
                .map_err(|e| external_service_error("onesignal", format!("bad response: {e}")))?;
            info!(message_id = %parsed.id, "Push accepted by OneSignal");
            Ok(DispatchResult::sent(parsed.id))
        })
    }

    fn backend(&self) -> &'static str {
        "onesignal"
    }

    fn channel(&self) -> Channel {
        Channel::Push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OneSignalProvider {
        OneSignalProvider::new(&OneSignalConfig {
            app_id: "app-1".into(),
            api_key: "os-key".into(),
        })
        .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn user_target_uses_external_user_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/notifications"))
            .and(body_partial_json(json!({
                "app_id": "app-1",
                "include_external_user_ids": ["user-7"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "os-1" })))
            .mount(&server)
            .await;

        let result = provider(&server)
            .send(PushMessage {
                target: PushTarget::Users(vec!["user-7".into()]),
                title: "Hello".into(),
                body: "World".into(),
                image_url: None,
                data: HashMap::new(),
            })
            .await
            .unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("os-1"));
    }
}
