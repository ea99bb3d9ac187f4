// --- File: crates/courier_sms/src/twilio.rs ---
//! Twilio Messages API adapter (form POST with basic auth).

use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use courier_common::error::{external_service_error, CourierError};
use courier_common::services::{BoxFuture, Channel, ChannelProvider, DispatchResult, SmsMessage};
use courier_config::TwilioConfig;

// --- Static HTTP Client ---
// Initialize reqwest client lazily and store it statically
static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

pub struct TwilioProvider {
    config: TwilioConfig,
    base_url: String,
}

impl TwilioProvider {
    pub fn new(config: &TwilioConfig) -> Self {
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

impl ChannelProvider<SmsMessage> for TwilioProvider {
    fn send(&self, message: SmsMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let url = format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                self.base_url, self.config.account_sid
            );
            let from = message.from.as_deref().unwrap_or(&self.config.phone_number);
            let params = [
                ("To", message.to.as_str()),
                ("From", from),
                ("Body", message.body.as_str()),
            ];

            let response = HTTP_CLIENT
                .post(&url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&params)
                .send()
                .await
                .map_err(|e| external_service_error("twilio", e))?;

            let status = response.status();
            if !status.is_success() {
                // Bubble up the Twilio JSON error so the caller can debug.
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error(
                    "twilio",
                    format!("{status}: {body}"),
                ));
            }

            let parsed: TwilioMessageResponse = response
                .json()
                .await
                .map_err(|e| external_service_error("twilio", format!("bad response: {e}")))?;
            info!(to = %message.to, sid = %parsed.sid, "SMS accepted by Twilio");
            Ok(DispatchResult::sent(parsed.sid))
        })
    }

    fn backend(&self) -> &'static str {
        "twilio"
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

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "token".into(),
            phone_number: "+15550001111".into(),
        }
    }

    fn message() -> SmsMessage {
        SmsMessage {
            to: "+41790000000".into(),
            body: "Your OTP is: 123456. Valid for 10 minutes.".into(),
            from: None,
        }
    }

    #[tokio::test]
    async fn returns_message_sid_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "sid": "SM0011", "status": "queued" })),
            )
            .mount(&server)
            .await;

        let provider = TwilioProvider::new(&config()).with_base_url(server.uri());
        let result = provider.send(message()).await.unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("SM0011"));
    }

    #[tokio::test]
    async fn error_body_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "code": 21211, "message": "Invalid 'To' number" })),
            )
            .mount(&server)
            .await;

        let provider = TwilioProvider::new(&config()).with_base_url(server.uri());
        let err = provider.send(message()).await.unwrap_err();
        assert!(err.is_retryable());
        match err {
            CourierError::ExternalServiceError { provider, message } => {
                assert_eq!(provider, "twilio");
                assert!(message.contains("21211"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
