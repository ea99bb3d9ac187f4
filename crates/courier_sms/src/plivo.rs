// --- File: crates/courier_sms/src/plivo.rs ---
//! Plivo Message API adapter (JSON POST with basic auth).

use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_common::error::{external_service_error, CourierError};
use courier_common::services::{BoxFuture, Channel, ChannelProvider, DispatchResult, SmsMessage};
use courier_config::PlivoConfig;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://api.plivo.com";

#[derive(Serialize)]
struct PlivoSendRequest<'a> {
    src: &'a str,
    dst: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct PlivoSendResponse {
    message_uuid: Vec<String>,
}

pub struct PlivoProvider {
    config: PlivoConfig,
    base_url: String,
}

impl PlivoProvider {
    pub fn new(config: &PlivoConfig) -> Self {
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
}

impl ChannelProvider<SmsMessage> for PlivoProvider {
    fn send(&self, message: SmsMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let url = format!(
                "{}/v1/Account/{}/Message/",
                self.base_url, self.config.auth_id
            );
            let request = PlivoSendRequest {
                src: message.from.as_deref().unwrap_or(&self.config.phone_number),
                dst: &message.to,
                text: &message.body,
            };

            let response = HTTP_CLIENT
                .post(&url)
                .basic_auth(&self.config.auth_id, Some(&self.config.auth_token))
                .json(&request)
                .send()
                .await
                .map_err(|e| external_service_error("plivo", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error("plivo", format!("{status}: {body}")));
            }

            let parsed: PlivoSendResponse = response
                .json()
                .await
                .map_err(|e| external_service_error("plivo", format!("bad response: {e}")))?;
            let message_uuid = parsed
                .message_uuid
                .into_iter()
                .next()
                .ok_or_else(|| external_service_error("plivo", "response carried no message uuid"))?;
            info!(to = %message.to, %message_uuid, "SMS accepted by Plivo");
            Ok(DispatchResult::sent(message_uuid))
        })
    }

    fn backend(&self) -> &'static str {
        "plivo"
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn first_message_uuid_becomes_provider_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/Account/MA123/Message/"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "message": "message(s) queued",
                "message_uuid": ["uuid-1", "uuid-2"]
            })))
            .mount(&server)
            .await;

        let provider = PlivoProvider::new(&PlivoConfig {
            auth_id: "MA123".into(),
            auth_token: "token".into(),
            phone_number: "+15550001111".into(),
        })
        .with_base_url(server.uri());

        let result = provider
            .send(SmsMessage {
                to: "+41790000000".into(),
                body: "hi".into(),
                from: None,
            })
            .await
            .unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("uuid-1"));
    }
}
