// --- File: crates/courier_email/src/lib.rs ---
//! Email channel adapters.
//!
//! Two real backends (SMTP via lettre, SendGrid via the v3 REST API) plus
//! the shared simulated variant from `courier_common`. Backend selection
//! happens in the notification registry from `EmailConfig::provider`.

pub mod sendgrid;
pub mod smtp;

pub use sendgrid::SendgridProvider;
pub use smtp::SmtpProvider;
