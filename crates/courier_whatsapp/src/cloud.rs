// --- File: crates/courier_whatsapp/src/cloud.rs ---
//! Meta WhatsApp Business Cloud API adapter.
//!
//! Free-form text is deliverable only inside an open 24-hour customer
//! service window; outside of it the API requires a pre-approved template
//! message, so both payload shapes are supported.

use once_cell::sync::Lazy;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use courier_common::error::{external_service_error, CourierError};
use courier_common::services::{
    BoxFuture, Channel, ChannelProvider, DispatchResult, WhatsAppContent, WhatsAppMessage,
};
use courier_config::WhatsAppConfig;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";

#[derive(Deserialize)]
struct CloudApiResponse {
    messages: Vec<CloudApiMessage>,
}

#[derive(Deserialize)]
struct CloudApiMessage {
    id: String,
}

pub struct CloudApiProvider {
    config: WhatsAppConfig,
    base_url: String,
}

impl CloudApiProvider {
    pub fn new(config: &WhatsAppConfig) -> Self {
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

    fn build_payload(message: &WhatsAppMessage) -> Value {
        match &message.content {
            WhatsAppContent::Text { body } => json!({
                "messaging_product": "whatsapp",
                "to": message.to,
                "type": "text",
                "text": { "body": body },
            }),
            WhatsAppContent::Template {
                name,
                language,
                parameters,
            } => {
                let components: Vec<Value> = if parameters.is_empty() {
                    vec![]
                } else {
                    vec![json!({
                        "type": "body",
                        "parameters": parameters
                            .iter()
                            .map(|p| json!({ "type": "text", "text": p }))
                            .collect::<Vec<Value>>(),
                    })]
                };
                json!({
                    "messaging_product": "whatsapp",
                    "to": message.to,
                    "type": "template",
                    "template": {
                        "name": name,
                        "language": { "code": language },
                        "components": components,
                    },
                })
            }
        }
    }
}

impl ChannelProvider<WhatsAppMessage> for CloudApiProvider {
    fn send(&self, message: WhatsAppMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let url = format!(
                "{}/{}/{}/messages",
                self.base_url, self.config.api_version, self.config.phone_number_id
            );
            let payload = Self::build_payload(&message);

            let response = HTTP_CLIENT
                .post(&url)
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", self.config.access_token),
                )
                .json(&payload)
                .send()
                .await
                .map_err(|e| external_service_error("whatsapp", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error(
                    "whatsapp",
                    format!("{status}: {body}"),
                ));
            }

            let parsed: CloudApiResponse = response
                .json()
                .await
                .map_err(|e| external_service_error("whatsapp", format!("bad response: {e}")))?;
            let message_id = parsed
                .messages
                .into_iter()
                .next()
                .map(|m| m.id)
                .ok_or_else(|| external_service_error("whatsapp", "response carried no message id"))?;
            info!(to = %message.to, %message_id, "WhatsApp message accepted");
            Ok(DispatchResult::sent(message_id))
        })
    }

    fn backend(&self) -> &'static str {
        "whatsapp_cloud_api"
    }

    fn channel(&self) -> Channel {
        Channel::WhatsApp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> WhatsAppConfig {
        WhatsAppConfig {
            provider: courier_config::WhatsAppProviderKind::CloudApi,
            access_token: "wa-token".into(),
            phone_number_id: "1020".into(),
            api_version: "v18.0".into(),
            verify_token: "hub-secret".into(),
            app_secret: None,
        }
    }

    #[tokio::test]
    async fn text_message_uses_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/1020/messages"))
            .and(header("Authorization", "Bearer wa-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "type": "text",
                "text": { "body": "hello" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messaging_product": "whatsapp",
                "messages": [{ "id": "wamid.123" }],
            })))
            .mount(&server)
            .await;

        let provider = CloudApiProvider::new(&config()).with_base_url(server.uri());
        let result = provider
            .send(WhatsAppMessage {
                to: "41790000000".into(),
                content: WhatsAppContent::Text {
                    body: "hello".into(),
                },
            })
            .await
            .unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("wamid.123"));
    }

    #[tokio::test]
    async fn template_message_carries_body_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/1020/messages"))
            .and(body_partial_json(json!({
                "type": "template",
                "template": {
                    "name": "otp_verification",
                    "language": { "code": "en" },
                },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "wamid.456" }],
            })))
            .mount(&server)
            .await;

        let provider = CloudApiProvider::new(&config()).with_base_url(server.uri());
        let result = provider
            .send(WhatsAppMessage {
                to: "41790000000".into(),
                content: WhatsAppContent::Template {
                    name: "otp_verification".into(),
                    language: "en".into(),
                    parameters: vec!["123456".into()],
                },
            })
            .await
            .unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("wamid.456"));
    }

    #[tokio::test]
    async fn graph_api_error_body_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/1020/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid OAuth access token", "code": 190 },
            })))
            .mount(&server)
            .await;

        let provider = CloudApiProvider::new(&config()).with_base_url(server.uri());
        let err = provider
            .send(WhatsAppMessage {
                to: "41790000000".into(),
                content: WhatsAppContent::Text { body: "hi".into() },
            })
            .await
            .unwrap_err();
        match err {
            CourierError::ExternalServiceError { provider, message } => {
                assert_eq!(provider, "whatsapp");
                assert!(message.contains("190"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
