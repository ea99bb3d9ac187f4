// --- File: crates/courier_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g., sqlite://courier.db, loaded via COURIER_DATABASE__URL
}

/// Deployment environment. Simulated providers are only legal outside production.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

// --- Provider selection ---
// Each channel names its backend with a closed enum, so an unrecognized
// provider string fails when the configuration is deserialized, not at the
// first send.

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    Smtp,
    Sendgrid,
    Simulated,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsProviderKind {
    Twilio,
    Plivo,
    Webhook,
    Simulated,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WhatsAppProviderKind {
    CloudApi,
    Simulated,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PushProviderKind {
    Fcm,
    Onesignal,
    Simulated,
}

// --- Email ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String, // Loaded via COURIER_EMAIL__SMTP__PASSWORD
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SendgridConfig {
    pub api_key: String, // Loaded via COURIER_EMAIL__SENDGRID__API_KEY
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub provider: EmailProviderKind,
    pub from_address: String,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub sendgrid: Option<SendgridConfig>,
}

// --- SMS ---
// Holds non-secret Twilio config; the auth token arrives via env override.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String, // Loaded via COURIER_SMS__TWILIO__AUTH_TOKEN
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlivoConfig {
    pub auth_id: String,
    pub auth_token: String,
    pub phone_number: String,
}

/// Generic webhook backend: POST the message as JSON to a configured URL.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsWebhookConfig {
    pub url: String,
    #[serde(default)]
    pub auth_header: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsConfig {
    pub provider: SmsProviderKind,
    #[serde(default)]
    pub twilio: Option<TwilioConfig>,
    #[serde(default)]
    pub plivo: Option<PlivoConfig>,
    #[serde(default)]
    pub webhook: Option<SmsWebhookConfig>,
}

// --- WhatsApp ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_provider")]
    pub provider: WhatsAppProviderKind,
    pub access_token: String, // Loaded via COURIER_WHATSAPP__ACCESS_TOKEN
    pub phone_number_id: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Shared secret echoed back during the webhook subscribe handshake.
    pub verify_token: String,
    /// App secret for X-Hub-Signature-256 body verification, when enabled.
    #[serde(default)]
    pub app_secret: Option<String>,
}

fn default_whatsapp_provider() -> WhatsAppProviderKind {
    WhatsAppProviderKind::CloudApi
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

// --- Push ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    /// Path to the Google service account key file.
    pub key_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OneSignalConfig {
    pub app_id: String,
    pub api_key: String, // Loaded via COURIER_PUSH__ONESIGNAL__API_KEY
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    pub provider: PushProviderKind,
    #[serde(default)]
    pub fcm: Option<FcmConfig>,
    #[serde(default)]
    pub onesignal: Option<OneSignalConfig>,
    /// Device tokens idle longer than this are removed by cleanup.
    #[serde(default = "default_token_max_idle_days")]
    pub token_max_idle_days: i64,
}

fn default_token_max_idle_days() -> i64 {
    90
}

// --- Retry ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

// --- Unified App Configuration ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    #[serde(default)]
    pub environment: Environment,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_email: bool,
    #[serde(default)]
    pub use_sms: bool,
    #[serde(default)]
    pub use_whatsapp: bool,
    #[serde(default)]
    pub use_push: bool,

    // --- Optional Feature Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub sms: Option<SmsConfig>,
    #[serde(default)]
    pub whatsapp: Option<WhatsAppConfig>,
    #[serde(default)]
    pub push: Option<PushConfig>,
    #[serde(default)]
    pub retry: RetryConfig,
}
