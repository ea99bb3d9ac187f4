// --- File: crates/courier_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all Courier errors.
///
/// This enum provides a common set of error variants that can be used across all crates.
/// Each crate can extend this by implementing From<SpecificError> for CourierError.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Input failed validation (missing template variables, duplicate names, bad payloads)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An operation was attempted against an object in the wrong lifecycle state
    #[error("Invalid state transition: {0}")]
    StateError(String),

    /// A template, token or log row could not be found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Missing, unknown or inconsistent configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An external transport rejected the request or timed out.
    ///
    /// Carries the provider identity so retry logging and webhook
    /// correlation can name the backend involved.
    #[error("External service error: {provider} - {message}")]
    ExternalServiceError { provider: String, message: String },

    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CourierError {
    /// Whether the delivery engine is allowed to retry after this error.
    ///
    /// Only provider-side failures are retryable; validation, state and
    /// configuration errors would fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CourierError::ExternalServiceError { .. })
    }
}

/// A trait for converting errors to HTTP status codes.
///
/// This trait can be implemented by error types to provide a consistent way
/// to convert errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for CourierError {
    fn status_code(&self) -> u16 {
        match self {
            CourierError::ValidationError(_) => 400,
            CourierError::StateError(_) => 409,
            CourierError::NotFoundError(_) => 404,
            CourierError::ConfigError(_) => 500,
            CourierError::ExternalServiceError { .. } => 502,
            CourierError::HttpError(_) => 500,
            CourierError::ParseError(_) => 400,
            CourierError::DatabaseError(_) => 500,
            CourierError::InternalError(_) => 500,
        }
    }
}

// Utility functions for error handling
pub fn validation_error<T: fmt::Display>(message: T) -> CourierError {
    CourierError::ValidationError(message.to_string())
}

pub fn state_error<T: fmt::Display>(message: T) -> CourierError {
    CourierError::StateError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> CourierError {
    CourierError::NotFoundError(message.to_string())
}

pub fn config_error<T: fmt::Display>(message: T) -> CourierError {
    CourierError::ConfigError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(provider: &str, message: T) -> CourierError {
    CourierError::ExternalServiceError {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> CourierError {
    CourierError::InternalError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_external_service_errors() {
        assert!(external_service_error("twilio", "timeout").is_retryable());
        assert!(!validation_error("missing field").is_retryable());
        assert!(!state_error("draft -> active").is_retryable());
        assert!(!config_error("unknown provider").is_retryable());
    }

    #[test]
    fn status_codes_map_taxonomy() {
        assert_eq!(validation_error("x").status_code(), 400);
        assert_eq!(state_error("x").status_code(), 409);
        assert_eq!(not_found("x").status_code(), 404);
        assert_eq!(external_service_error("fcm", "x").status_code(), 502);
    }
}
