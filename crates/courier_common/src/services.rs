// --- File: crates/courier_common/src/services.rs ---
//! Service abstractions for outbound messaging channels.
//!
//! This module provides trait definitions for the channel providers used by the
//! application. These traits allow for dependency injection and easier testing by
//! decoupling the dispatch logic from specific implementations of external transports.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::CourierError;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// The outbound channels Courier can dispatch through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    WhatsApp,
    Push,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
            Channel::WhatsApp => write!(f, "whatsapp"),
            Channel::Push => write!(f, "push"),
        }
    }
}

/// Result of a single dispatch through a provider adapter.
///
/// The provider message id is the external transport's identifier for the
/// message. It is the correlation key for asynchronous delivery-status
/// webhooks, so adapters must surface it whenever the backend returns one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub success: bool,
    pub provider_message_id: Option<String>,
}

impl DispatchResult {
    pub fn sent(provider_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_message_id: Some(provider_message_id.into()),
        }
    }
}

/// An email to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

/// An SMS to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
    #[serde(default)]
    pub from: Option<String>,
}

/// Content of a WhatsApp message.
///
/// Free-form text is only deliverable inside an open customer-service window;
/// outside of it the Business Cloud API requires a pre-approved template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WhatsAppContent {
    Text { body: String },
    Template {
        name: String,
        language: String,
        #[serde(default)]
        parameters: Vec<String>,
    },
}

/// A WhatsApp message to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppMessage {
    pub to: String,
    pub content: WhatsAppContent,
}

/// Target of a push notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushTarget {
    /// A single device registration token.
    Token(String),
    /// Several device registration tokens (multicast).
    Tokens(Vec<String>),
    /// A topic devices subscribe to.
    Topic(String),
    /// External user ids, for backends that address users directly.
    Users(Vec<String>),
}

/// A push notification to dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub target: PushTarget,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// The uniform send contract implemented by every provider adapter.
///
/// One implementation per external transport per channel. Adapters never
/// retry internally; the retry policy is centralized in
/// [`crate::delivery::DeliveryService`], keeping adapters simple and
/// independently testable.
pub trait ChannelProvider<M>: Send + Sync {
    /// Dispatch one message through the external transport.
    fn send(&self, message: M) -> BoxFuture<'_, DispatchResult, CourierError>;

    /// Identity of the backend, used in logs and error annotations.
    fn backend(&self) -> &'static str;

    /// The channel this adapter serves.
    fn channel(&self) -> Channel;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Channel::WhatsApp).unwrap(), "\"whatsapp\"");
        assert_eq!(Channel::Sms.to_string(), "sms");
    }

    #[test]
    fn whatsapp_content_is_tagged() {
        let content = WhatsAppContent::Template {
            name: "otp_verification".into(),
            language: "en".into(),
            parameters: vec!["123456".into()],
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "template");
        assert_eq!(json["name"], "otp_verification");
    }
}
