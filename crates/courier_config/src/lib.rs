// --- File: crates/courier_config/src/lib.rs ---
//! Configuration loading for the Courier workspace.
//!
//! Layered sources, later ones overriding earlier ones:
//! 1. `config/default.toml`
//! 2. `config/{RUN_ENV}.toml` (e.g. `config/production.toml`)
//! 3. Environment variables prefixed `COURIER`, with `__` as the section
//!    separator (e.g. `COURIER_SMS__TWILIO__AUTH_TOKEN`).
//!
//! Secrets only ever arrive through the environment layer; the TOML files
//! carry the non-secret shape. [`validate`] runs after deserialization and
//! rejects inconsistent provider selections at startup, so a misconfigured
//! channel fails at load time rather than at the first send.

pub mod models;

pub use config::ConfigError;
pub use models::*;

use config::{Config, Environment as EnvSource, File};
use courier_common::error::CourierError;
use once_cell::sync::Lazy;

static DOTENV: Lazy<()> = Lazy::new(|| {
    // Missing .env files are fine; env vars may come from the process env.
    let _ = dotenv::dotenv();
});

/// Ensure `.env` has been loaded into the process environment exactly once.
pub fn ensure_dotenv_loaded() {
    Lazy::force(&DOTENV);
}

/// Load the application configuration from files and environment overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_env}")).required(false))
        .add_source(EnvSource::with_prefix("COURIER").separator("__"))
        .build()?;

    config.try_deserialize::<AppConfig>()
}

/// Cross-field validation of a deserialized [`AppConfig`].
///
/// Checks that every enabled channel carries its section, that the selected
/// provider's sub-config is present, and that simulated providers are not
/// selected in production.
pub fn validate(config: &AppConfig) -> Result<(), CourierError> {
    let production = config.environment == Environment::Production;

    if config.use_email {
        let email = config
            .email
            .as_ref()
            .ok_or_else(|| missing_section("email"))?;
        match email.provider {
            EmailProviderKind::Smtp if email.smtp.is_none() => {
                return Err(missing_provider_config("email", "smtp"));
            }
            EmailProviderKind::Sendgrid if email.sendgrid.is_none() => {
                return Err(missing_provider_config("email", "sendgrid"));
            }
            EmailProviderKind::Simulated if production => {
                return Err(simulated_in_production("email"));
            }
            _ => {}
        }
    }

    if config.use_sms {
        let sms = config.sms.as_ref().ok_or_else(|| missing_section("sms"))?;
        match sms.provider {
            SmsProviderKind::Twilio if sms.twilio.is_none() => {
                return Err(missing_provider_config("sms", "twilio"));
            }
            SmsProviderKind::Plivo if sms.plivo.is_none() => {
                return Err(missing_provider_config("sms", "plivo"));
            }
            SmsProviderKind::Webhook if sms.webhook.is_none() => {
                return Err(missing_provider_config("sms", "webhook"));
            }
            SmsProviderKind::Simulated if production => {
                return Err(simulated_in_production("sms"));
            }
            _ => {}
        }
    }

    if config.use_whatsapp {
        let whatsapp = config
            .whatsapp
            .as_ref()
            .ok_or_else(|| missing_section("whatsapp"))?;
        if whatsapp.provider == WhatsAppProviderKind::Simulated && production {
            return Err(simulated_in_production("whatsapp"));
        }
    }

    if config.use_push {
        let push = config.push.as_ref().ok_or_else(|| missing_section("push"))?;
        match push.provider {
            PushProviderKind::Fcm if push.fcm.is_none() => {
                return Err(missing_provider_config("push", "fcm"));
            }
            PushProviderKind::Onesignal if push.onesignal.is_none() => {
                return Err(missing_provider_config("push", "onesignal"));
            }
            PushProviderKind::Simulated if production => {
                return Err(simulated_in_production("push"));
            }
            _ => {}
        }
    }

    Ok(())
}

fn missing_section(channel: &str) -> CourierError {
    CourierError::ConfigError(format!("use_{channel} is set but [{channel}] section is missing"))
}

fn missing_provider_config(channel: &str, provider: &str) -> CourierError {
    CourierError::ConfigError(format!(
        "{channel} provider '{provider}' selected but [{channel}.{provider}] section is missing"
    ))
}

fn simulated_in_production(channel: &str) -> CourierError {
    CourierError::ConfigError(format!(
        "{channel} provider 'simulated' is not allowed when environment = production"
    ))
}
