// --- File: crates/courier_templates/src/seed.rs ---
//! Built-in starter templates for development environments.
//!
//! Each seed is created, approved and activated so a fresh instance can
//! render and send immediately. Seeding skips any (name, language) that
//! already exists.

use tracing::{debug, info};

use courier_common::error::CourierError;

use crate::manager::TemplateManager;
use crate::model::{NewTemplate, TemplateChannel};

pub fn default_templates() -> Vec<NewTemplate> {
    vec![
        NewTemplate {
            name: "welcome".into(),
            channel: TemplateChannel::Email,
            category: "onboarding".into(),
            language: "en".into(),
            subject: Some("Welcome aboard".into()),
            html_body: Some("<h1>Welcome {{name}}!</h1><p>Thank you for joining our platform.</p>".into()),
            text_body: Some("Welcome {{name}}! Thank you for joining our platform.".into()),
            message_body: None,
            variables: vec!["name".into()],
            created_by: Some("seed".into()),
        },
        NewTemplate {
            name: "invoice_created".into(),
            channel: TemplateChannel::Email,
            category: "transactional".into(),
            language: "en".into(),
            subject: Some("New Invoice Created - {{invoiceNumber}}".into()),
            html_body: Some(
                "<h1>Invoice {{invoiceNumber}}</h1><p>A new invoice has been created for {{amount}}.</p>".into(),
            ),
            text_body: Some(
                "Invoice {{invoiceNumber}} - A new invoice has been created for {{amount}}.".into(),
            ),
            message_body: None,
            variables: vec!["invoiceNumber".into(), "amount".into()],
            created_by: Some("seed".into()),
        },
        NewTemplate {
            name: "payment_received".into(),
            channel: TemplateChannel::Email,
            category: "transactional".into(),
            language: "en".into(),
            subject: Some("Payment Received - {{invoiceNumber}}".into()),
            html_body: Some(
                "<h1>Payment Received</h1><p>Payment of {{amount}} received for invoice {{invoiceNumber}}.</p>".into(),
            ),
            text_body: Some(
                "Payment Received - Payment of {{amount}} received for invoice {{invoiceNumber}}.".into(),
            ),
            message_body: None,
            variables: vec!["invoiceNumber".into(), "amount".into()],
            created_by: Some("seed".into()),
        },
        NewTemplate {
            name: "password_reset".into(),
            channel: TemplateChannel::Email,
            category: "security".into(),
            language: "en".into(),
            subject: Some("Password Reset Request".into()),
            html_body: Some(
                "<h1>Password Reset</h1><p>Click <a href=\"{{resetLink}}\">here</a> to reset your password.</p>".into(),
            ),
            text_body: Some(
                "Password Reset - Click this link to reset your password: {{resetLink}}".into(),
            ),
            message_body: None,
            variables: vec!["resetLink".into()],
            created_by: Some("seed".into()),
        },
        NewTemplate {
            name: "otp_sms".into(),
            channel: TemplateChannel::Sms,
            category: "verification".into(),
            language: "en".into(),
            subject: None,
            html_body: None,
            text_body: None,
            message_body: Some("Your OTP is: {{otp}}. Valid for {{validMinutes}} minutes.".into()),
            variables: vec!["otp".into(), "validMinutes".into()],
            created_by: Some("seed".into()),
        },
    ]
}

/// Create and activate the default templates, skipping ones that exist.
pub async fn seed_defaults(manager: &TemplateManager) -> Result<usize, CourierError> {
    let mut seeded = 0;
    for definition in default_templates() {
        let existing = manager
            .find_active(&definition.name, &definition.language)
            .await?;
        if existing.is_some() {
            debug!(name = %definition.name, "Seed template already present");
            continue;
        }
        let name = definition.name.clone();
        let created = match manager.create(definition).await {
            Ok(template) => template,
            Err(CourierError::ValidationError(_)) => {
                // An inactive version exists; leave it to the operator.
                debug!(%name, "Seed template exists but is not active");
                continue;
            }
            Err(err) => return Err(err),
        };
        manager.submit_for_approval(created.id).await?;
        manager.approve(created.id, "seed").await?;
        manager.activate(created.id).await?;
        seeded += 1;
    }
    if seeded > 0 {
        info!(count = seeded, "Seeded default templates");
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTemplateStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let manager = TemplateManager::new(Arc::new(InMemoryTemplateStore::new()));
        let first = seed_defaults(&manager).await.unwrap();
        assert_eq!(first, default_templates().len());

        let second = seed_defaults(&manager).await.unwrap();
        assert_eq!(second, 0);

        let otp = manager.find_active("otp_sms", "en").await.unwrap().unwrap();
        assert!(otp.is_active);
        assert_eq!(otp.variables, vec!["otp".to_string(), "validMinutes".to_string()]);
    }
}
