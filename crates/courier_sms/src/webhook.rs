// --- File: crates/courier_sms/src/webhook.rs ---
//! Generic webhook SMS adapter: POSTs the message as JSON to a configured
//! URL, for gateways and aggregators without a dedicated integration.

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use courier_common::error::{external_service_error, CourierError};
use courier_common::services::{BoxFuture, Channel, ChannelProvider, DispatchResult, SmsMessage};
use courier_config::SmsWebhookConfig;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

pub struct WebhookSmsProvider {
    url: String,
    auth_header: Option<String>,
}

impl WebhookSmsProvider {
    pub fn new(config: &SmsWebhookConfig) -> Self {
        Self {
            url: config.url.clone(),
            auth_header: config.auth_header.clone(),
        }
    }
}

impl ChannelProvider<SmsMessage> for WebhookSmsProvider {
    fn send(&self, message: SmsMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            let mut request = HTTP_CLIENT.post(&self.url).json(&message);
            if let Some(auth) = &self.auth_header {
                request = request.header(reqwest::header::AUTHORIZATION, auth);
            }

            let response = request
                .send()
                .await
                .map_err(|e| external_service_error("sms_webhook", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(external_service_error(
                    "sms_webhook",
                    format!("{status}: {body}"),
                ));
            }

            // Gateways that return a JSON message_id get proper webhook
            // correlation; the rest get a local id.
            let message_id = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message_id").and_then(|id| id.as_str()).map(String::from))
                .unwrap_or_else(|| format!("sms-{}", Uuid::new_v4()));
            info!(to = %message.to, %message_id, "SMS accepted by webhook gateway");
            Ok(DispatchResult::sent(message_id))
        })
    }

    fn backend(&self) -> &'static str {
        "sms_webhook"
    }

    fn channel(&self) -> Channel {
        Channel::Sms
    }
}
