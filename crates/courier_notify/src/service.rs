// --- File: crates/courier_notify/src/service.rs ---
//! The notification facade.
//!
//! One entry point per channel, each wrapping its provider adapter in a
//! retry-aware delivery service. Every successful dispatch appends a usage
//! row and pokes the webhook tracker so status events that raced the
//! dispatch get replayed against the fresh row.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use courier_common::delivery::{DeliveryService, RetryPolicy};
use courier_common::error::{config_error, validation_error, CourierError};
use courier_common::services::{
    Channel, DispatchResult, EmailMessage, PushMessage, PushTarget, SmsMessage, WhatsAppContent,
    WhatsAppMessage,
};
use courier_config::RetryConfig;
use courier_db::DeviceTokenRepository;
use courier_push::UNREGISTERED_MARKER;
use courier_templates::renderer::{Rendered, TemplateRenderer};
use courier_templates::store::TemplateStore;
use courier_templates::usage::{UsageLog, UsageRecord};
use courier_webhooks::DeliveryTracker;

use crate::registry::ProviderRegistry;

/// Convert the configured retry parameters into a delivery policy.
pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.max_retries,
        base_delay: std::time::Duration::from_millis(config.base_delay_ms),
        max_delay: std::time::Duration::from_millis(config.max_delay_ms),
    }
}

/// Push content addressed to a user rather than a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// Outcome of a per-device push fan-out for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushDispatchSummary {
    pub user_id: String,
    pub attempted: usize,
    pub sent: usize,
    pub invalidated: usize,
    pub errors: Vec<String>,
}

pub struct NotificationService {
    email: Option<DeliveryService<EmailMessage>>,
    sms: Option<DeliveryService<SmsMessage>>,
    whatsapp: Option<DeliveryService<WhatsAppMessage>>,
    push: Option<DeliveryService<PushMessage>>,
    renderer: TemplateRenderer,
    store: Arc<dyn TemplateStore>,
    usage_log: Arc<dyn UsageLog>,
    tracker: Arc<DeliveryTracker>,
    tokens: Arc<dyn DeviceTokenRepository>,
}

impl NotificationService {
    pub fn new(
        registry: ProviderRegistry,
        policy: RetryPolicy,
        store: Arc<dyn TemplateStore>,
        usage_log: Arc<dyn UsageLog>,
        tracker: Arc<DeliveryTracker>,
        tokens: Arc<dyn DeviceTokenRepository>,
    ) -> Self {
        Self {
            email: registry
                .email
                .map(|p| DeliveryService::new(p, policy.clone())),
            sms: registry.sms.map(|p| DeliveryService::new(p, policy.clone())),
            whatsapp: registry
                .whatsapp
                .map(|p| DeliveryService::new(p, policy.clone())),
            push: registry.push.map(|p| DeliveryService::new(p, policy)),
            renderer: TemplateRenderer::new(Arc::clone(&store)),
            store,
            usage_log,
            tracker,
            tokens,
        }
    }

    fn channel_disabled(channel: Channel) -> CourierError {
        config_error(format!("{channel} channel is not enabled"))
    }

    /// Append the usage row for a dispatch and replay any status events
    /// that arrived before the row existed.
    async fn record_dispatch(&self, record: UsageRecord) -> Result<(), CourierError> {
        let provider_message_id = record.provider_message_id.clone();
        self.usage_log.record(record).await?;
        if let Some(pmid) = provider_message_id {
            self.tracker.notify_dispatched(&pmid).await;
        }
        Ok(())
    }

    pub async fn send_email(&self, message: EmailMessage) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .email
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::Email))?;
        if message.to.is_empty() {
            return Err(validation_error("email has no recipients"));
        }
        let recipient = message.to.join(", ");
        let result = delivery.send(message).await?;
        self.record_dispatch(UsageRecord::dispatched(
            Channel::Email,
            recipient,
            result.provider_message_id.clone(),
        ))
        .await?;
        Ok(result)
    }

    pub async fn send_sms(&self, message: SmsMessage) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .sms
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::Sms))?;
        let recipient = message.to.clone();
        let result = delivery.send(message).await?;
        self.record_dispatch(UsageRecord::dispatched(
            Channel::Sms,
            recipient,
            result.provider_message_id.clone(),
        ))
        .await?;
        Ok(result)
    }

    pub async fn send_whatsapp(
        &self,
        message: WhatsAppMessage,
    ) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .whatsapp
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::WhatsApp))?;
        let recipient = message.to.clone();
        let result = delivery.send(message).await?;
        self.record_dispatch(UsageRecord::dispatched(
            Channel::WhatsApp,
            recipient,
            result.provider_message_id.clone(),
        ))
        .await?;
        Ok(result)
    }

    /// Fan a push notification out to every active device of a user.
    ///
    /// A backend reporting the token as unregistered gets the token marked
    /// invalid so the next fan-out skips it; other per-device failures are
    /// collected without aborting the remaining devices.
    pub async fn send_push(
        &self,
        user_id: &str,
        payload: PushPayload,
    ) -> Result<PushDispatchSummary, CourierError> {
        let delivery = self
            .push
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::Push))?;

        let devices = self.tokens.find_active_by_user(user_id).await?;
        if devices.is_empty() {
            return Err(CourierError::NotFoundError(format!(
                "no active device tokens for user '{user_id}'"
            )));
        }

        let mut summary = PushDispatchSummary {
            user_id: user_id.to_string(),
            attempted: devices.len(),
            sent: 0,
            invalidated: 0,
            errors: Vec::new(),
        };

        for device in devices {
            let message = PushMessage {
                target: PushTarget::Token(device.token.clone()),
                title: payload.title.clone(),
                body: payload.body.clone(),
                image_url: payload.image_url.clone(),
                data: payload.data.clone(),
            };
            match delivery.send(message).await {
                Ok(result) => {
                    summary.sent += 1;
                    self.tokens.record_sent(&device.token).await?;
                    self.record_dispatch(UsageRecord::dispatched(
                        Channel::Push,
                        user_id,
                        result.provider_message_id.clone(),
                    ))
                    .await?;
                }
                Err(CourierError::ExternalServiceError { provider, message })
                    if message.contains(UNREGISTERED_MARKER) =>
                {
                    info!(user_id, token = %device.token, "Device token no longer registered");
                    self.tokens.mark_invalid(&device.token).await?;
                    summary.invalidated += 1;
                    summary
                        .errors
                        .push(format!("{provider}: token unregistered"));
                }
                Err(err) => {
                    warn!(user_id, token = %device.token, error = %err, "Push dispatch failed");
                    summary.errors.push(err.to_string());
                }
            }
        }
        Ok(summary)
    }

    pub async fn send_templated_email(
        &self,
        to: &str,
        template_name: &str,
        language: &str,
        variables: HashMap<String, String>,
    ) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .email
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::Email))?;
        let (template, rendered) = self
            .renderer
            .render(template_name, language, &variables)
            .await?;
        let Rendered::Email {
            subject,
            html,
            text,
        } = rendered
        else {
            return Err(validation_error(format!(
                "template '{template_name}' is not an email template"
            )));
        };

        let message = EmailMessage {
            to: vec![to.to_string()],
            subject,
            html,
            text,
            from: None,
            cc: Vec::new(),
            bcc: Vec::new(),
        };
        let result = delivery.send(message).await?;
        self.store.record_dispatch(template.id).await?;
        self.record_dispatch(
            UsageRecord::dispatched(Channel::Email, to, result.provider_message_id.clone())
                .with_template(template.id, template.version)
                .with_variables(variables),
        )
        .await?;
        Ok(result)
    }

    pub async fn send_templated_sms(
        &self,
        to: &str,
        template_name: &str,
        language: &str,
        variables: HashMap<String, String>,
    ) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .sms
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::Sms))?;
        let (template, rendered) = self
            .renderer
            .render(template_name, language, &variables)
            .await?;
        let Rendered::Message { message } = rendered else {
            return Err(validation_error(format!(
                "template '{template_name}' is not a message template"
            )));
        };

        let result = delivery
            .send(SmsMessage {
                to: to.to_string(),
                body: message,
                from: None,
            })
            .await?;
        self.store.record_dispatch(template.id).await?;
        self.record_dispatch(
            UsageRecord::dispatched(Channel::Sms, to, result.provider_message_id.clone())
                .with_template(template.id, template.version)
                .with_variables(variables),
        )
        .await?;
        Ok(result)
    }

    pub async fn send_templated_whatsapp(
        &self,
        to: &str,
        template_name: &str,
        language: &str,
        variables: HashMap<String, String>,
    ) -> Result<DispatchResult, CourierError> {
        let delivery = self
            .whatsapp
            .as_ref()
            .ok_or_else(|| Self::channel_disabled(Channel::WhatsApp))?;
        let (template, rendered) = self
            .renderer
            .render(template_name, language, &variables)
            .await?;
        let Rendered::Message { message } = rendered else {
            return Err(validation_error(format!(
                "template '{template_name}' is not a message template"
            )));
        };

        let result = delivery
            .send(WhatsAppMessage {
                to: to.to_string(),
                content: WhatsAppContent::Text { body: message },
            })
            .await?;
        self.store.record_dispatch(template.id).await?;
        self.record_dispatch(
            UsageRecord::dispatched(Channel::WhatsApp, to, result.provider_message_id.clone())
                .with_template(template.id, template.version)
                .with_variables(variables),
        )
        .await?;
        Ok(result)
    }

    /// Dispatch a batch of emails concurrently.
    ///
    /// One failing item never aborts the rest; the caller gets one outcome
    /// per input message, in input order.
    pub async fn send_bulk_emails(
        &self,
        messages: Vec<EmailMessage>,
    ) -> Vec<Result<DispatchResult, CourierError>> {
        join_all(messages.into_iter().map(|m| self.send_email(m))).await
    }
}
