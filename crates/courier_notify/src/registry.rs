// --- File: crates/courier_notify/src/registry.rs ---
//! Provider registry: configuration to concrete adapter wiring.
//!
//! One adapter per enabled channel, chosen by the closed provider enums in
//! the configuration. Construction fails fast, so a typo in the provider
//! section stops the service at startup instead of at the first send.

use std::sync::Arc;

use tracing::info;

use courier_common::error::{config_error, CourierError};
use courier_common::services::{
    Channel, ChannelProvider, EmailMessage, PushMessage, SmsMessage, WhatsAppMessage,
};
use courier_common::SimulatedProvider;
use courier_config::{
    AppConfig, EmailProviderKind, PushProviderKind, SmsProviderKind, WhatsAppProviderKind,
};
use courier_email::{SendgridProvider, SmtpProvider};
use courier_push::{FcmProvider, OneSignalProvider};
use courier_sms::{PlivoProvider, TwilioProvider, WebhookSmsProvider};
use courier_whatsapp::CloudApiProvider;

/// The concrete adapter behind each enabled channel.
pub struct ProviderRegistry {
    pub email: Option<Arc<dyn ChannelProvider<EmailMessage>>>,
    pub sms: Option<Arc<dyn ChannelProvider<SmsMessage>>>,
    pub whatsapp: Option<Arc<dyn ChannelProvider<WhatsAppMessage>>>,
    pub push: Option<Arc<dyn ChannelProvider<PushMessage>>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("email", &self.email.is_some())
            .field("sms", &self.sms.is_some())
            .field("whatsapp", &self.whatsapp.is_some())
            .field("push", &self.push.is_some())
            .finish()
    }
}

impl ProviderRegistry {
    /// Build adapters for every channel the configuration enables.
    ///
    /// Runs [`courier_config::validate`] first; disabled channels stay
    /// `None` and never cost a connection.
    pub fn from_config(config: &AppConfig) -> Result<Self, CourierError> {
        courier_config::validate(config)?;

        let email = if config.use_email {
            Some(build_email(config)?)
        } else {
            None
        };
        let sms = if config.use_sms {
            Some(build_sms(config)?)
        } else {
            None
        };
        let whatsapp = if config.use_whatsapp {
            Some(build_whatsapp(config)?)
        } else {
            None
        };
        let push = if config.use_push {
            Some(build_push(config)?)
        } else {
            None
        };

        Ok(Self {
            email,
            sms,
            whatsapp,
            push,
        })
    }
}

fn build_email(config: &AppConfig) -> Result<Arc<dyn ChannelProvider<EmailMessage>>, CourierError> {
    let email = config
        .email
        .as_ref()
        .ok_or_else(|| config_error("email enabled without [email] section"))?;
    let provider: Arc<dyn ChannelProvider<EmailMessage>> = match email.provider {
        EmailProviderKind::Smtp => {
            let smtp = email
                .smtp
                .as_ref()
                .ok_or_else(|| config_error("[email.smtp] section is missing"))?;
            Arc::new(SmtpProvider::new(email, smtp)?)
        }
        EmailProviderKind::Sendgrid => {
            let sendgrid = email
                .sendgrid
                .as_ref()
                .ok_or_else(|| config_error("[email.sendgrid] section is missing"))?;
            Arc::new(SendgridProvider::new(sendgrid, &email.from_address))
        }
        EmailProviderKind::Simulated => Arc::new(SimulatedProvider::new(Channel::Email)),
    };
    info!(backend = provider.backend(), "Email provider configured");
    Ok(provider)
}

fn build_sms(config: &AppConfig) -> Result<Arc<dyn ChannelProvider<SmsMessage>>, CourierError> {
    let sms = config
        .sms
        .as_ref()
        .ok_or_else(|| config_error("sms enabled without [sms] section"))?;
    let provider: Arc<dyn ChannelProvider<SmsMessage>> = match sms.provider {
        SmsProviderKind::Twilio => {
            let twilio = sms
                .twilio
                .as_ref()
                .ok_or_else(|| config_error("[sms.twilio] section is missing"))?;
            Arc::new(TwilioProvider::new(twilio))
        }
        SmsProviderKind::Plivo => {
            let plivo = sms
                .plivo
                .as_ref()
                .ok_or_else(|| config_error("[sms.plivo] section is missing"))?;
            Arc::new(PlivoProvider::new(plivo))
        }
        SmsProviderKind::Webhook => {
            let webhook = sms
                .webhook
                .as_ref()
                .ok_or_else(|| config_error("[sms.webhook] section is missing"))?;
            Arc::new(WebhookSmsProvider::new(webhook))
        }
        SmsProviderKind::Simulated => Arc::new(SimulatedProvider::new(Channel::Sms)),
    };
    info!(backend = provider.backend(), "SMS provider configured");
    Ok(provider)
}

fn build_whatsapp(
    config: &AppConfig,
) -> Result<Arc<dyn ChannelProvider<WhatsAppMessage>>, CourierError> {
    let whatsapp = config
        .whatsapp
        .as_ref()
        .ok_or_else(|| config_error("whatsapp enabled without [whatsapp] section"))?;
    let provider: Arc<dyn ChannelProvider<WhatsAppMessage>> = match whatsapp.provider {
        WhatsAppProviderKind::CloudApi => Arc::new(CloudApiProvider::new(whatsapp)),
        WhatsAppProviderKind::Simulated => Arc::new(SimulatedProvider::new(Channel::WhatsApp)),
    };
    info!(backend = provider.backend(), "WhatsApp provider configured");
    Ok(provider)
}

fn build_push(config: &AppConfig) -> Result<Arc<dyn ChannelProvider<PushMessage>>, CourierError> {
    let push = config
        .push
        .as_ref()
        .ok_or_else(|| config_error("push enabled without [push] section"))?;
    let provider: Arc<dyn ChannelProvider<PushMessage>> = match push.provider {
        PushProviderKind::Fcm => {
            let fcm = push
                .fcm
                .as_ref()
                .ok_or_else(|| config_error("[push.fcm] section is missing"))?;
            Arc::new(FcmProvider::new(fcm))
        }
        PushProviderKind::Onesignal => {
            let onesignal = push
                .onesignal
                .as_ref()
                .ok_or_else(|| config_error("[push.onesignal] section is missing"))?;
            Arc::new(OneSignalProvider::new(onesignal))
        }
        PushProviderKind::Simulated => Arc::new(SimulatedProvider::new(Channel::Push)),
    };
    info!(backend = provider.backend(), "Push provider configured");
    Ok(provider)
}
