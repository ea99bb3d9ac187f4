// --- File: crates/courier_email/src/sendgrid.rs ---
//! SendGrid v3 mail-send adapter.

use once_cell::sync::Lazy;
use reqwest::{header, Client};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use courier_common::error::{external_service_error, validation_error, CourierError};
use courier_common::services::{BoxFuture, Channel, ChannelProvider, DispatchResult, EmailMessage};
use courier_config::SendgridConfig;

// --- Static HTTP Client ---
// Initialize reqwest client lazily and store it statically
static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

const DEFAULT_BASE_URL: &str = "https://api.sendgrid.com";

#[derive(Serialize)]
struct MailSendRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<Content>,
}

#[derive(Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<EmailAddress>,
}

#[derive(Serialize)]
struct EmailAddress {
    email: String,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: String,
}

pub struct SendgridProvider {
    api_key: String,
    from_address: String,
    base_url: String,
}

impl SendgridProvider {
    pub fn new(config: &SendgridConfig, from_address: &str) -> Self {
        Self {
            api_key: config.api_key.clone(),
            from_address: from_address.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a different API host, for tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_request(&self, message: &EmailMessage) -> Result<MailSendRequest, CourierError> {
        // SendGrid requires text/plain before text/html in the content array.
        let mut content = Vec::new();
        if let Some(text) = &message.text {
            content.push(Content {
                content_type: "text/plain",
                value: text.clone(),
            });
        }
        if let Some(html) = &message.html {
            content.push(Content {
                content_type: "text/html",
                value: html.clone(),
            });
        }
        if content.is_empty() {
            return Err(validation_error("email has neither html nor text body"));
        }

        let address = |email: &String| EmailAddress {
            email: email.clone(),
        };
        Ok(MailSendRequest {
            personalizations: vec![Personalization {
                to: message.to.iter().map(address).collect(),
                cc: message.cc.iter().map(address).collect(),
                bcc: message.bcc.iter().map(address).collect(),
            }],
            from: EmailAddress {
                email: message
                    .from
                    .clone()
                    .unwrap_or_else(|| self.from_address.clone()),
            },
            subject: message.subject.clone(),
            content,
        })
    }
}

impl ChannelProvider<EmailMessage> for SendgridProvider {
    fn send(&self, message: EmailMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            if message.to.is_empty() {
                return Err(validation_error("email has no recipients"));
            }
            let request = self.build_request(&message)?;
            let url = format!("{}/v3/mail/send", self.base_url);

            let response = HTTP_CLIENT
                .post(&url)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .map_err(|e| external_service_error("sendgrid", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error(
                    "sendgrid",
                    format!("{status}: {body}"),
                ));
            }

            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("sendgrid-{}", Uuid::new_v4()));
            info!(recipients = message.to.len(), %message_id, "Email accepted by SendGrid");
            Ok(DispatchResult::sent(message_id))
        })
    }

    fn backend(&self) -> &'static str {
        "sendgrid"
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> EmailMessage {
        EmailMessage {
            to: vec!["user@example.com".into()],
            subject: "Hello".into(),
            html: Some("<p>Hello</p>".into()),
            text: Some("Hello".into()),
            from: None,
            cc: vec![],
            bcc: vec![],
        }
    }

    #[tokio::test]
    async fn surfaces_message_id_from_response_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("Authorization", "Bearer sg-key"))
            .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "sg-abc123"))
            .mount(&server)
            .await;

        let provider = SendgridProvider::new(
            &SendgridConfig {
                api_key: "sg-key".into(),
            },
            "noreply@example.com",
        )
        .with_base_url(server.uri());

        let result = provider.send(message()).await.unwrap();
        assert_eq!(result.provider_message_id.as_deref(), Some("sg-abc123"));
    }

    #[tokio::test]
    async fn api_rejection_is_an_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("{\"errors\":[{\"message\":\"bad\"}]}"),
            )
            .mount(&server)
            .await;

        let provider = SendgridProvider::new(
            &SendgridConfig {
                api_key: "sg-key".into(),
            },
            "noreply@example.com",
        )
        .with_base_url(server.uri());

        let err = provider.send(message()).await.unwrap_err();
        match err {
            CourierError::ExternalServiceError { provider, message } => {
                assert_eq!(provider, "sendgrid");
                assert!(message.contains("400"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
