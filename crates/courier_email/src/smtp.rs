// --- File: crates/courier_email/src/smtp.rs ---
//! SMTP adapter backed by lettre's async transport.
//!
//! SMTP acceptance does not yield a provider-side message id, so a local
//! correlation id is generated; webhook-driven status updates are therefore
//! only available for backends that return their own id.

use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;
use uuid::Uuid;

use courier_common::error::{config_error, external_service_error, validation_error, CourierError};
use courier_common::services::{BoxFuture, Channel, ChannelProvider, DispatchResult, EmailMessage};
use courier_config::{EmailConfig, SmtpConfig};

pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpProvider {
    pub fn new(email: &EmailConfig, smtp: &SmtpConfig) -> Result<Self, CourierError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| config_error(format!("invalid SMTP relay '{}': {e}", smtp.host)))?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from_address: email.from_address.clone(),
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, CourierError> {
        let from = message.from.as_deref().unwrap_or(&self.from_address);
        let from_mailbox: Mailbox = from
            .parse()
            .map_err(|e| validation_error(format!("invalid from address '{from}': {e}")))?;

        let mut builder = Message::builder()
            .from(from_mailbox)
            .subject(message.subject.clone());
        for to in &message.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| validation_error(format!("invalid recipient '{to}': {e}")))?;
            builder = builder.to(mailbox);
        }
        for cc in &message.cc {
            let mailbox: Mailbox = cc
                .parse()
                .map_err(|e| validation_error(format!("invalid cc address '{cc}': {e}")))?;
            builder = builder.cc(mailbox);
        }
        for bcc in &message.bcc {
            let mailbox: Mailbox = bcc
                .parse()
                .map_err(|e| validation_error(format!("invalid bcc address '{bcc}': {e}")))?;
            builder = builder.bcc(mailbox);
        }

        let built = match (&message.html, &message.text) {
            (Some(html), Some(text)) => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))
            }
            (Some(html), None) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone()),
            (None, Some(text)) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone()),
            (None, None) => {
                return Err(validation_error("email has neither html nor text body"));
            }
        };
        built.map_err(|e| validation_error(format!("could not build email: {e}")))
    }
}

impl ChannelProvider<EmailMessage> for SmtpProvider {
    fn send(&self, message: EmailMessage) -> BoxFuture<'_, DispatchResult, CourierError> {
        Box::pin(async move {
            if message.to.is_empty() {
                return Err(validation_error("email has no recipients"));
            }
            let email = self.build_message(&message)?;
            self.transport
                .send(email)
                .await
                .map_err(|e| external_service_error("smtp", e))?;

            let message_id = format!("smtp-{}", Uuid::new_v4());
            info!(recipients = message.to.len(), %message_id, "Email accepted by SMTP relay");
            Ok(DispatchResult::sent(message_id))
        })
    }

    fn backend(&self) -> &'static str {
        "smtp"
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SmtpProvider {
        let email = EmailConfig {
            provider: courier_config::EmailProviderKind::Smtp,
            from_address: "noreply@example.com".into(),
            smtp: None,
            sendgrid: None,
        };
        let smtp = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "mailer".into(),
            password: "secret".into(),
        };
        SmtpProvider::new(&email, &smtp).unwrap()
    }

    #[test]
    fn builds_multipart_when_both_bodies_present() {
        let message = EmailMessage {
            to: vec!["user@example.com".into()],
            subject: "Hi".into(),
            html: Some("<p>Hi</p>".into()),
            text: Some("Hi".into()),
            from: None,
            cc: vec![],
            bcc: vec![],
        };
        assert!(provider().build_message(&message).is_ok());
    }

    #[test]
    fn rejects_bodyless_email() {
        let message = EmailMessage {
            to: vec!["user@example.com".into()],
            subject: "Hi".into(),
            html: None,
            text: None,
            from: None,
            cc: vec![],
            bcc: vec![],
        };
        let err = provider().build_message(&message).unwrap_err();
        assert!(matches!(err, CourierError::ValidationError(_)));
    }

    #[test]
    fn rejects_malformed_recipient() {
        let message = EmailMessage {
            to: vec!["not-an-address".into()],
            subject: "Hi".into(),
            html: None,
            text: Some("Hi".into()),
            from: None,
            cc: vec![],
            bcc: vec![],
        };
        let err = provider().build_message(&message).unwrap_err();
        assert!(matches!(err, CourierError::ValidationError(_)));
    }
}
